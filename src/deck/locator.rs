//! Shape Locator: finds the semantic regions of a template slide.
//!
//! Regions are discovered from shape content and relative position instead of
//! shape indexes, so editing the template in PowerPoint does not break them:
//!
//! 1. a graphic frame holding a table is the table region
//! 2. text shapes are matched against an ordered rule table, first match wins
//! 3. pictures are assigned to labels by position (nearest picture below a label,
//!    or for regions with a duplicate variant, the unclaimed pictures below the
//!    label ordered by width)
use crate::deck::shape::Geometry;
use crate::deck::shape::ShapeInfo;
use crate::deck::shape::ShapeKind;
use crate::deck::Slide;
use crate::error::ReportError;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Semantic roles of template shapes
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Title,
    Period,
    RegistrationUsers,
    Mau,
    Distribution,
    TopTicketsLabel,
    PurchaseChartLabel,
    LoginChartLabel,
    BrandChartLabel,
    Table,
    LoginChartImage,
    PurchaseChartImage,
    BrandChartImage,
    BrandChartDuplicate,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Title => "title",
            Role::Period => "period",
            Role::RegistrationUsers => "registration_users",
            Role::Mau => "mau",
            Role::Distribution => "distribution",
            Role::TopTicketsLabel => "top_tickets_label",
            Role::PurchaseChartLabel => "purchase_chart_label",
            Role::LoginChartLabel => "login_chart_label",
            Role::BrandChartLabel => "brand_chart_label",
            Role::Table => "table",
            Role::LoginChartImage => "login_chart_image",
            Role::PurchaseChartImage => "purchase_chart_image",
            Role::BrandChartImage => "brand_chart_image",
            Role::BrandChartDuplicate => "brand_chart_duplicate",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text rule: a shape whose text contains every marker of any alternative gets `role`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TextRule {
    pub role: Role,
    pub any_of: Vec<Vec<String>>,
}

impl TextRule {
    fn matches(&self, text: &str) -> bool {
        self.any_of
            .iter()
            .any(|markers| markers.iter().all(|marker| text.contains(marker.as_str())))
    }
}

/// Image rule: pictures below the `label` region become `primary` (and `duplicate`)
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ImageRule {
    pub label: Role,
    pub primary: Role,
    #[serde(default)]
    pub duplicate: Option<Role>,
}

pub(crate) fn default_text_rules() -> Vec<TextRule> {
    let rule = |role: Role, any_of: &[&[&str]]| TextRule {
        role,
        any_of: any_of
            .iter()
            .map(|markers| markers.iter().map(|marker| marker.to_string()).collect())
            .collect(),
    };
    vec![
        rule(Role::Title, &[&["ご報告資料"]]),
        rule(Role::Period, &[&["期間", "yyyy"]]),
        rule(Role::RegistrationUsers, &[&["初回登録ユーザー数"]]),
        rule(Role::Mau, &[&["MAU"]]),
        rule(Role::Distribution, &[&["流通総額"], &["総購入金額"]]),
        rule(Role::TopTicketsLabel, &[&["購入上位"], &["TOP10"]]),
        rule(Role::PurchaseChartLabel, &[&["購入数推移"]]),
        rule(Role::LoginChartLabel, &[&["ログインユーザー数推移"]]),
        rule(Role::BrandChartLabel, &[&["ブランド"]]),
    ]
}

pub(crate) fn default_image_rules() -> Vec<ImageRule> {
    vec![
        ImageRule {
            label: Role::LoginChartLabel,
            primary: Role::LoginChartImage,
            duplicate: None,
        },
        ImageRule {
            label: Role::PurchaseChartLabel,
            primary: Role::PurchaseChartImage,
            duplicate: None,
        },
        ImageRule {
            label: Role::BrandChartLabel,
            primary: Role::BrandChartImage,
            duplicate: Some(Role::BrandChartDuplicate),
        },
    ]
}

/// Roles a complete template is expected to provide
pub(crate) fn expected_roles(text_rules: &[TextRule], image_rules: &[ImageRule]) -> Vec<Role> {
    let mut roles = vec![Role::Table];
    roles.extend(text_rules.iter().map(|rule| rule.role));
    roles.extend(image_rules.iter().map(|rule| rule.primary));
    roles
}

/// Role → drawing id of the shape bound to it; immutable once located
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionMap {
    regions: BTreeMap<Role, u32>,
}

impl RegionMap {
    pub fn get(&self, role: Role) -> Option<u32> {
        self.regions.get(&role).copied()
    }

    pub fn contains(&self, role: Role) -> bool {
        self.regions.contains_key(&role)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Binds a role unless it is already taken; returns whether it was bound
    fn claim(&mut self, role: Role, shape: &ShapeInfo) -> bool {
        if let Some(existing) = self.regions.get(&role) {
            log::warn!(
                "Shape {} ('{}') also matches region '{}', keeping shape {}",
                shape.id, shape.name, role, existing
            );
            return false;
        }
        self.regions.insert(role, shape.id);
        true
    }
}

/// Nearest picture strictly below `label`, ties going to the earlier shape
fn nearest_below<'a>(label: Geometry, pictures: &[&'a ShapeInfo]) -> Option<&'a ShapeInfo> {
    let mut best: Option<(&'a ShapeInfo, i64)> = None;
    for &picture in pictures {
        let top = match picture.geometry {
            Some(geometry) => geometry.y,
            None => continue,
        };
        if top <= label.y {
            continue;
        }
        let distance = top - label.y;
        if best.map(|(_, best)| distance < best).unwrap_or(true) {
            best = Some((picture, distance));
        }
    }
    best.map(|(picture, _)| picture)
}

/// Classifies the top-level shapes of a slide into regions.
///
/// # Arguments
/// * `slide` - The slide to inspect
/// * `text_rules` - Ordered text rules, earlier rules win
/// * `image_rules` - Label-relative picture rules, applied in order
///
/// # Returns
/// * `Result<RegionMap, ReportError>` - The located regions; missing roles are only logged
pub fn locate(slide: &Slide, text_rules: &[TextRule], image_rules: &[ImageRule]) -> Result<RegionMap, ReportError> {
    let shapes = slide.shapes()?;
    let mut regions = RegionMap::default();
    let mut pictures = Vec::<&ShapeInfo>::new();

    for shape in &shapes {
        match shape.kind {
            ShapeKind::Table => {
                regions.claim(Role::Table, shape);
            }
            ShapeKind::Picture => pictures.push(shape),
            ShapeKind::Text => {
                if let Some(rule) = text_rules.iter().find(|rule| rule.matches(&shape.text)) {
                    regions.claim(rule.role, shape);
                }
            }
            ShapeKind::Other => (),
        }
    }

    let geometry_of = |id: u32| shapes.iter().find(|shape| shape.id == id).and_then(|shape| shape.geometry);
    let mut claimed = Vec::<u32>::new();
    for rule in image_rules {
        let label = match regions.get(rule.label).and_then(geometry_of) {
            Some(label) => label,
            None => continue,
        };
        match rule.duplicate {
            None => {
                if let Some(picture) = nearest_below(label, &pictures) {
                    if regions.claim(rule.primary, picture) {
                        claimed.push(picture.id);
                    }
                }
            }
            Some(duplicate) => {
                let mut below: Vec<&ShapeInfo> = pictures
                    .iter()
                    .copied()
                    .filter(|picture| !claimed.contains(&picture.id))
                    .filter(|picture| picture.geometry.map(|geometry| geometry.y > label.y).unwrap_or(false))
                    .collect();
                below.sort_by_key(|picture| std::cmp::Reverse(picture.geometry.map(|geometry| geometry.cx).unwrap_or(0)));
                let mut below = below.into_iter();
                if let Some(primary) = below.next() {
                    if regions.claim(rule.primary, primary) {
                        claimed.push(primary.id);
                    }
                }
                if let Some(second) = below.next() {
                    if regions.claim(duplicate, second) {
                        claimed.push(second.id);
                    }
                }
            }
        }
    }

    let missing: Vec<&str> = expected_roles(text_rules, image_rules)
        .into_iter()
        .filter(|role| !regions.contains(*role))
        .map(|role| role.as_str())
        .collect();
    if !missing.is_empty() {
        log::warn!("Regions not found in '{}': {}", slide.part, missing.join(", "));
    }
    log::debug!("Located {} regions in '{}'", regions.len(), slide.part);
    Ok(regions)
}
