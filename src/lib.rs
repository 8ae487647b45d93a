pub use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use tera::Tera;

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod ocean;
pub mod paths;
pub mod plan;
pub mod process;
pub mod service;
pub mod shell;

#[cfg(test)]
mod tests;

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = match Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")) {
            Ok(t) => t,
            Err(e) => panic!("Error parsing templates: {e}"),
        };
        tera.register_filter("skill_str", ocean::analysis::skill_str);
        tera
    };
}

/// Returns `true` if a template with the given name was loaded into [`TEMPLATES`].
pub fn has_template(name: &str) -> bool {
    TEMPLATES.get_template_names().any(|n| n == name)
}
