//! In-memory report template used by the deck and pipeline tests.
use crate::deck::Deck;
use crate::package::Package;
use std::path::Path;

pub(crate) const TABLE_ROWS: usize = 11;
pub(crate) const TABLE_COLUMNS: usize = 4;
pub(crate) const COLUMN_WIDTH: i64 = 1_500_000;
pub(crate) const ROW_HEIGHT: i64 = 200_000;
pub(crate) const TEMPLATE_PICTURES: usize = 4;

// Drawing ids of the template shapes
pub(crate) const TITLE_ID: u32 = 2;
pub(crate) const PERIOD_ID: u32 = 3;
pub(crate) const LOGIN_LABEL_ID: u32 = 8;
pub(crate) const LOGIN_PICTURE_ID: u32 = 9;
pub(crate) const PURCHASE_LABEL_ID: u32 = 10;
pub(crate) const PURCHASE_PICTURE_ID: u32 = 11;
pub(crate) const BRAND_WIDE_PICTURE_ID: u32 = 13;
pub(crate) const BRAND_NARROW_PICTURE_ID: u32 = 14;
pub(crate) const TABLE_ID: u32 = 15;
pub(crate) const EMPTY_TEXT_ID: u32 = 16;

const NAMESPACES: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

fn xfrm(prefix: &str, x: i64, y: i64, cx: i64, cy: i64) -> String {
    format!(r#"<{prefix}:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></{prefix}:xfrm>"#)
}

fn text_shape(id: u32, y: i64, runs: &[(&str, u32)]) -> String {
    let runs: String = runs
        .iter()
        .map(|(text, size)| format!(r#"<a:r><a:rPr lang="ja-JP" sz="{size}" b="1"/><a:t>{text}</a:t></a:r>"#))
        .collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="TextBox {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr wrap="none"/><a:lstStyle/><a:p>{runs}<a:endParaRPr lang="ja-JP" sz="1200"/></a:p></p:txBody></p:sp>"#,
        xfrm("a", 400_000, y, 4_000_000, 300_000)
    )
}

fn picture(id: u32, relationship: &str, y: i64, cx: i64) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{relationship}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        xfrm("a", 400_000, y, cx, 600_000)
    )
}

fn table(id: u32) -> String {
    let grid: String = (0..TABLE_COLUMNS)
        .map(|_| format!(r#"<a:gridCol w="{COLUMN_WIDTH}"/>"#))
        .collect();
    let headers = ["ブランド名", "販売総額", "発行数", "購入者数"];
    let rows: String = (0..TABLE_ROWS)
        .map(|row| {
            let cells: String = (0..TABLE_COLUMNS)
                .map(|col| {
                    let text = if row == 0 { headers[col].to_owned() } else { format!("dummy{row}") };
                    format!(
                        r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="ja-JP" sz="1050"/><a:t>{text}</a:t></a:r></a:p></a:txBody><a:tcPr/></a:tc>"#
                    )
                })
                .collect();
            format!(r#"<a:tr h="{ROW_HEIGHT}">{cells}</a:tr>"#)
        })
        .collect();
    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {id}"/><p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>{}<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblPr firstRow="1"/><a:tblGrid>{grid}</a:tblGrid>{rows}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
        xfrm("p", 4_800_000, 2_000_000, COLUMN_WIDTH * TABLE_COLUMNS as i64, ROW_HEIGHT * TABLE_ROWS as i64)
    )
}

pub(crate) fn slide_xml() -> String {
    let shapes = [
        text_shape(TITLE_ID, 100_000, &[("〇〇〇〇 ご報告資料", 2400)]),
        text_shape(PERIOD_ID, 500_000, &[("期間：yyyy/mm/dd", 1200), ("〜yyyy/mm/dd", 1200)]),
        text_shape(4, 800_000, &[("■初回登録ユーザー数：xx人", 1400)]),
        text_shape(5, 1_100_000, &[("■MAU(購入ユーザー数)：xx人", 1400)]),
        text_shape(6, 1_400_000, &[("　商品代流通総額：xx円 (総購入金額：xx円)", 1200)]),
        text_shape(7, 1_700_000, &[("■購入上位TOP10", 1400)]),
        text_shape(
            LOGIN_LABEL_ID,
            2_000_000,
            &[("■ログインユーザー数推移", 1400), ("（", 1200), ("yyyy", 1200), ("/mm", 1200), ("の週次ログイン", 1200), ("：　人）", 1200)],
        ),
        picture(LOGIN_PICTURE_ID, "rId2", 2_300_000, 4_000_000),
        text_shape(
            PURCHASE_LABEL_ID,
            3_000_000,
            &[("■購入数推移", 1400), ("（", 1200), ("yyyy", 1200), ("/mm", 1200), ("の週次購入", 1200), ("：　件）", 1200)],
        ),
        picture(PURCHASE_PICTURE_ID, "rId3", 3_300_000, 4_000_000),
        text_shape(12, 4_000_000, &[("■ブランド別販売状況", 1400)]),
        picture(BRAND_WIDE_PICTURE_ID, "rId4", 4_300_000, 4_200_000),
        picture(BRAND_NARROW_PICTURE_ID, "rId5", 4_300_000, 2_000_000),
        table(TABLE_ID),
        text_shape(EMPTY_TEXT_ID, 100_000, &[]),
    ];
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld {NAMESPACES}><p:cSld><p:bg><p:bgPr><a:solidFill><a:schemeClr val="bg1"/></a:solidFill><a:effectLst/></p:bgPr></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        shapes.join("")
    )
}

pub(crate) fn template_package() -> Package {
    let text = |value: &str| value.as_bytes().to_vec();
    let mut parts = vec![
        (
            "[Content_Types].xml".to_owned(),
            text(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/></Types>"#),
        ),
        (
            "_rels/.rels".to_owned(),
            text(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#),
        ),
        (
            "ppt/presentation.xml".to_owned(),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation {NAMESPACES}><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#).into_bytes(),
        ),
        (
            "ppt/_rels/presentation.xml.rels".to_owned(),
            text(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/></Relationships>"#),
        ),
        (
            "ppt/slideLayouts/slideLayout1.xml".to_owned(),
            format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout {NAMESPACES}><p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld></p:sldLayout>"#).into_bytes(),
        ),
        ("ppt/slides/slide1.xml".to_owned(), slide_xml().into_bytes()),
        (
            "ppt/slides/_rels/slide1.xml.rels".to_owned(),
            text(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.png"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image2.png"/><Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image3.png"/><Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image4.png"/></Relationships>"#),
        ),
    ];
    for index in 1..=TEMPLATE_PICTURES {
        parts.push((format!("ppt/media/image{index}.png"), vec![0x89, b'P', b'N', b'G', index as u8]));
    }
    Package::from_parts(parts).expect("fixture has content types")
}

pub(crate) fn template_deck() -> Deck {
    Deck::from_package(template_package()).expect("fixture has a presentation part")
}

pub(crate) fn write_template(path: &Path) {
    std::fs::write(path, template_package().to_bytes().unwrap()).unwrap();
}
