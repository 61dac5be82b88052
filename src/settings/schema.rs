use crate::models::{Task, Template};
use crate::utils::calculate_total_minutes;
use anyhow::Error;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Settings {
    pub api_host: Option<String>,
    pub user_id: Option<i64>,
    pub holiday_api_url: Option<Url>,
    pub holiday_cache_hours: Option<u64>,
    pub response_cache_minutes: Option<u64>,
    /// Saved tasks, the default planning input.
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl Settings {
    pub(crate) fn template(&self, name: &str) -> Option<Template> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .map(|mut template| {
                template.total_min = calculate_total_minutes(&template.tasks);
                template
            })
    }

    /// Tasks of the named template, or the saved tasks when no template is given.
    pub(crate) fn tasks_for(&self, template: Option<&str>) -> Result<Vec<Task>, Error> {
        match template {
            Some(name) => self
                .template(name)
                .map(|t| t.tasks)
                .ok_or_else(|| Error::msg(format!("Template '{name}' not found"))),
            None => Ok(self.tasks.clone()),
        }
    }
}
