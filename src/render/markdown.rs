use std::sync::OnceLock;

use minijinja::{Environment, context};

use crate::entities::result::Phenotype;
use crate::entities::selection::DrugSelection;
use crate::error::PharmaGuardError;
use crate::render::view::{ResultView, ResultsView};

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

const RESULT_SEPARATOR: &str = "\n---\n\n";

fn env() -> Result<&'static Environment<'static>, PharmaGuardError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("pct", |v: f64| -> String { format!("{:.1}%", v * 100.0) });
    env.add_template(
        "result.md.j2",
        include_str!("../../templates/result.md.j2"),
    )?;
    env.add_template("drugs.md.j2", include_str!("../../templates/drugs.md.j2"))?;

    let _ = ENV.set(env);
    ENV.get().ok_or_else(|| {
        PharmaGuardError::Template(minijinja::Error::new(
            minijinja::ErrorKind::InvalidOperation,
            "template environment was not initialized",
        ))
    })
}

pub fn result_markdown(view: &ResultView<'_>) -> Result<String, PharmaGuardError> {
    let tmpl = env()?.get_template("result.md.j2")?;
    let result = view.result;
    let phenotype = Phenotype::from_code(&result.pharmacogenomic_profile.phenotype);
    let body = tmpl.render(context! {
        result => result,
        timestamp => crate::utils::date::display_timestamp(&result.timestamp),
        risk_class => view.risk_class.as_str(),
        marker => view.emphasis.marker(),
        sections => view.sections,
        phenotype_description => phenotype.description(),
    })?;
    Ok(body)
}

pub fn results_markdown(view: &ResultsView<'_>) -> Result<String, PharmaGuardError> {
    let mut parts = Vec::with_capacity(view.items.len());
    for item in &view.items {
        parts.push(result_markdown(item)?);
    }
    Ok(parts.join(RESULT_SEPARATOR))
}

pub fn drugs_markdown(selection: &DrugSelection) -> Result<String, PharmaGuardError> {
    let tmpl = env()?.get_template("drugs.md.j2")?;
    let body = tmpl.render(context! {
        picks => selection.quick_picks(),
        text => selection.to_text(),
    })?;
    Ok(body)
}
