pub mod attachments;
pub mod auth;
pub mod issues;

use redmine_cli_api::RedmineClient;

use crate::output::OutputRenderer;

pub struct CommandContext<'a> {
    pub client: RedmineClient,
    pub renderer: &'a OutputRenderer,
    pub default_project: Option<String>,
}
