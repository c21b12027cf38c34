//! In-memory workbook templates used by the workbook and monthly report tests.
use crate::package::Package;
use crate::workbook::Workbook;
use std::path::Path;

pub(crate) const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="3" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

const MAIN_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIP_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WORKSHEET_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// Worksheet markup with the given `sheetData` rows
pub(crate) fn sheet_xml(rows: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NAMESPACE}" xmlns:r="{RELATIONSHIP_NAMESPACE}"><dimension ref="A1"/><sheetData>{rows}</sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#
    )
}

/// A workbook package with styles, a calculation chain and the given sheets
pub(crate) fn package(sheets: &[(&str, String)]) -> Package {
    let text = |value: &str| value.as_bytes().to_vec();
    let overrides: String = (1..=sheets.len())
        .map(|index| format!(r#"<Override PartName="/xl/worksheets/sheet{index}.xml" ContentType="{WORKSHEET_TYPE}"/>"#))
        .collect();
    let entries: String = sheets
        .iter()
        .enumerate()
        .map(|(index, (name, _))| format!(r#"<sheet name="{name}" sheetId="{id}" r:id="rId{id}"/>"#, id = index + 1))
        .collect();
    let sheet_relationships: String = (1..=sheets.len())
        .map(|index| format!(r#"<Relationship Id="rId{index}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{index}.xml"/>"#))
        .collect();
    let styles_id = sheets.len() + 1;
    let chain_id = sheets.len() + 2;
    let mut parts = vec![
        (
            "[Content_Types].xml".to_owned(),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/></Types>"#).into_bytes(),
        ),
        (
            "_rels/.rels".to_owned(),
            text(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#),
        ),
        (
            "xl/workbook.xml".to_owned(),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{MAIN_NAMESPACE}" xmlns:r="{RELATIONSHIP_NAMESPACE}"><workbookPr/><sheets>{entries}</sheets></workbook>"#).into_bytes(),
        ),
        (
            "xl/_rels/workbook.xml.rels".to_owned(),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{sheet_relationships}<Relationship Id="rId{styles_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId{chain_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/></Relationships>"#).into_bytes(),
        ),
        ("xl/styles.xml".to_owned(), text(STYLES)),
        (
            "xl/calcChain.xml".to_owned(),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><calcChain xmlns="{MAIN_NAMESPACE}"><c r="A2" i="1"/></calcChain>"#).into_bytes(),
        ),
    ];
    for (index, (_, rows)) in sheets.iter().enumerate() {
        parts.push((format!("xl/worksheets/sheet{}.xml", index + 1), sheet_xml(rows).into_bytes()));
    }
    Package::from_parts(parts).expect("fixture has content types")
}

/// Two sheets: `Data` with a header and two value rows, `集計結果` empty
pub(crate) fn workbook() -> Workbook {
    let data = concat!(
        r#"<row r="1"><c r="A1" t="inlineStr"><is><t>ブランド</t></is></c><c r="B1" t="s"><v>0</v></c></row>"#,
        r#"<row r="2" spans="1:2"><c r="A2"><v>1</v></c><c r="B2" s="1"><v>100</v></c></row>"#,
        r#"<row r="3"><c r="A3"><v>2</v></c><c r="B3" s="1"><v>5</v></c><c r="C3"><v>7</v></c></row>"#,
    );
    let bytes = package(&[("Data", data.to_owned()), ("集計結果", String::new())])
        .to_bytes()
        .unwrap();
    Workbook::from_bytes(&bytes).unwrap()
}

pub(crate) fn write_workbook(path: &Path, sheets: &[(&str, String)]) {
    std::fs::write(path, package(sheets).to_bytes().unwrap()).unwrap();
}
