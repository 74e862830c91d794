//! Plugin introspection commands

use async_trait::async_trait;

use super::{invoked, reply};
use crate::domain::entities::{EventKind, Message};
use crate::plugins::{Plugin, PluginContext, PluginDescriptor, PluginSummary};

fn describe(summary: &PluginSummary) -> String {
    let mut text = format!("**{}** v{}", summary.name, summary.version);
    if let Some(description) = &summary.description {
        text.push_str(": ");
        text.push_str(description);
    }
    text
}

pub struct PluginListPlugin {
    descriptor: PluginDescriptor,
}

impl PluginListPlugin {
    pub const NAME: &'static str = "plugin-list";
    const TRIGGER: &'static str = "/pluginlist";

    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new(Self::NAME, "1.0.0")
                .with_description("List the loaded plugins")
                .with_usage(Self::TRIGGER)
                .observes(EventKind::Message),
        }
    }
}

#[async_trait]
impl Plugin for PluginListPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn on_message(&self, ctx: &PluginContext, message: &Message) {
        if invoked(message, Self::TRIGGER).is_none() {
            return;
        }
        let Some(runtime) = ctx.runtime() else {
            return;
        };

        let plugins = runtime.plugin_list();
        let mut text = format!("{} plugin(s) loaded:\n", plugins.len());
        for summary in &plugins {
            text.push_str(&describe(summary));
            text.push('\n');
        }
        reply(ctx, message, &text).await;
    }
}

pub struct PluginInfoPlugin {
    descriptor: PluginDescriptor,
}

impl PluginInfoPlugin {
    pub const NAME: &'static str = "plugin-info";
    const TRIGGER: &'static str = "/plugininfo";

    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new(Self::NAME, "1.0.0")
                .with_description("Show the description and usage of a plugin")
                .with_usage("/plugininfo {plugin name}")
                .observes(EventKind::Message),
        }
    }
}

#[async_trait]
impl Plugin for PluginInfoPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn on_message(&self, ctx: &PluginContext, message: &Message) {
        let Some(tokens) = invoked(message, Self::TRIGGER) else {
            return;
        };
        let Some(runtime) = ctx.runtime() else {
            return;
        };

        let text = match tokens.get(1) {
            None => "Missing plugin name".to_string(),
            Some(name) => match runtime.plugin_info(name) {
                Ok(summary) => {
                    let mut text = describe(&summary);
                    if let Some(usage) = &summary.usage {
                        text.push_str("\nUsage: ");
                        text.push_str(usage);
                    }
                    text
                }
                Err(_) => format!("Plugin **{}** does not exist", name),
            },
        };
        reply(ctx, message, &text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let summary = PluginDescriptor::new("roll", "1.0.0").summary();
        assert_eq!(describe(&summary), "**roll** v1.0.0");

        let summary = PluginDescriptor::new("roll", "1.0.0").with_description("dice").summary();
        assert_eq!(describe(&summary), "**roll** v1.0.0: dice");
    }
}
