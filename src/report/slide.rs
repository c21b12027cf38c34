//! Fills one copy of the template slide with the data of one entity.
use crate::chart::ChartRenderer;
use crate::config::ReportConfig;
use crate::deck::binder::Binder;
use crate::deck::binder::LabelOutcome;
use crate::deck::Deck;
use crate::deck::Role;
use crate::error::ReportError;
use crate::report::entity::period_month;
use crate::report::entity::series_chart;
use crate::report::entity::series_total;
use crate::report::entity::Entity;
use crate::tabular::Table;
use regex::Regex;

/// Generates the slide of one entity into a fresh copy of the template.
///
/// Data gaps do not fail the entity: the affected region is cleared or removed
/// and a note is returned for the run summary. A missing region does fail it.
///
/// # Arguments
/// * `template` - Bytes of the template deck
/// * `entity` - The entity to render
/// * `config` - Run configuration
/// * `renderer` - Chart renderer shared by all entities
/// * `title_strip` - Compiled `title_strip_pattern`, shared by all entities
///
/// # Returns
/// * `Result<(Deck, Vec<String>), ReportError>` - The filled single-slide deck and its notes
pub fn build_slide(template: &[u8], entity: &Entity, config: &ReportConfig, renderer: &ChartRenderer, title_strip: &Regex) -> Result<(Deck, Vec<String>), ReportError> {
    let mut notes = Vec::new();
    let mut deck = Deck::from_bytes(template)?;
    let mut binder = Binder::new(&mut deck, &config.shape_rules, &config.image_rules)?;

    binder.replace_text(Role::Title, &format!("{} ご報告資料", entity.display_name(title_strip)))?;
    binder.replace_text(Role::Period, &entity.period_text(config))?;
    binder.replace_text(Role::RegistrationUsers, &entity.registration_text(config))?;
    binder.replace_text(Role::Mau, &entity.mau_text(config))?;
    binder.replace_text(Role::Distribution, &entity.distribution_text(config))?;

    let (year, month) = period_month(&entity.period_start(config));
    let datasets = &config.datasets;
    let labels = [
        (Role::LoginChartLabel, series_total(entity.login.as_ref(), &datasets.login)?, "人"),
        (Role::PurchaseChartLabel, series_total(entity.purchase.as_ref(), &datasets.purchase)?, "件"),
    ];
    for (role, total, unit) in labels {
        if let LabelOutcome::Malformed { runs } = binder.replace_chart_label(role, &year, &month, &total, unit)? {
            notes.push(format!("{role} has {runs} runs, label left unchanged"));
        }
    }

    match &entity.brand {
        Some(brand) if !brand.is_empty() => binder.fill_table(Role::Table, brand, &config.table)?,
        _ => {
            notes.push("no brand data, table cleared".to_owned());
            let empty = Table::new("brand", Vec::new());
            binder.fill_table(Role::Table, &empty, &config.table)?;
        }
    }

    let series = [
        (Role::LoginChartImage, entity.login.as_ref(), &datasets.login, "ユーザー数", &config.chart.login_color, "login"),
        (Role::PurchaseChartImage, entity.purchase.as_ref(), &datasets.purchase, "購入数", &config.chart.purchase_color, "purchase"),
    ];
    for (role, table, dataset, caption, color, name) in series {
        match series_chart(table, dataset, caption, color)? {
            Some(chart) => binder.replace_picture(role, renderer.render_bar(&chart)?, "png")?,
            None => {
                notes.push(format!("no {name} data, chart removed"));
                binder.remove_shape(role)?;
            }
        }
    }

    match entity.brand_donuts(config)? {
        Some((counts, prices)) => {
            binder.replace_picture(Role::BrandChartImage, renderer.render_double_donut(&counts, &prices)?, "png")?
        }
        None => {
            notes.push("no brand data, donut chart removed".to_owned());
            binder.remove_shape(Role::BrandChartImage)?;
        }
    }
    // The template carries a second, narrower copy of the donut
    binder.remove_shape(Role::BrandChartDuplicate)?;

    binder.finish()?;
    for note in &notes {
        log::info!("  {}: {}", entity.name, note);
    }
    Ok((deck, notes))
}
