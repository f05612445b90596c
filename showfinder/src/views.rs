//! HTML rendering.
//!
//! Handlers hand a template name and a JSON context to a [`Render`] implementation and get an
//! HTML body back. The production renderer is a minijinja environment over the templates in
//! `templates/`, compiled into the binary.

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;

use crate::errors::Error;

pub const LOGIN: &str = "login.html";
pub const REGISTER: &str = "register.html";
pub const DISCOVER: &str = "discover.html";
pub const LOGOUT: &str = "logout.html";

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    (LOGIN, include_str!("../templates/login.html")),
    (REGISTER, include_str!("../templates/register.html")),
    (DISCOVER, include_str!("../templates/discover.html")),
    (LOGOUT, include_str!("../templates/logout.html")),
];

pub trait Render: Send + Sync {
    fn render(&self, template: &str, context: Value) -> Result<String, Error>;
}

/// Renderer over the embedded templates. HTML templates are autoescaped, and missing context
/// values (including attributes of missing values) render as empty.
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, Error> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        for (name, source) in TEMPLATES {
            env.add_template(name, source).map_err(|e| Error::Internal {
                operation: format!("load template {name}: {e}"),
            })?;
        }
        Ok(Self { env })
    }
}

impl Render for Views {
    fn render(&self, template: &str, context: Value) -> Result<String, Error> {
        self.env
            .get_template(template)
            .and_then(|t| t.render(context))
            .map_err(|e| Error::Internal {
                operation: format!("render template {template}: {e:#}"),
            })
    }
}
