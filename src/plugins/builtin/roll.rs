use async_trait::async_trait;
use rand::RngExt;

use super::{invoked, reply};
use crate::application::messaging::int_arg;
use crate::domain::entities::{EventKind, Message};
use crate::plugins::{Plugin, PluginContext, PluginDescriptor};

const DEFAULT_MAX: i64 = 100;

/// Dice roll, `/roll [max]`
pub struct RollPlugin {
    descriptor: PluginDescriptor,
}

impl RollPlugin {
    pub const NAME: &'static str = "roll";
    const TRIGGER: &'static str = "/roll";

    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new(Self::NAME, "1.0.0")
                .with_description("Roll a number between 0 and max (default 100)")
                .with_usage("/roll [max]")
                .observes(EventKind::Message),
        }
    }
}

/// Upper bound of a roll, negative input falls back to the default
fn upper_bound(tokens: &[&str]) -> i64 {
    match int_arg(tokens, 1, DEFAULT_MAX) {
        max if max < 0 => DEFAULT_MAX,
        max => max,
    }
}

fn roll(max: i64) -> i64 {
    rand::rng().random_range(0..=max)
}

#[async_trait]
impl Plugin for RollPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn on_message(&self, ctx: &PluginContext, message: &Message) {
        let Some(tokens) = invoked(message, Self::TRIGGER) else {
            return;
        };
        let max = upper_bound(&tokens);
        let text = format!("rolled **{}** (0-{})", roll(max), max);
        reply(ctx, message, &text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upper_bound() {
        assert_eq!(upper_bound(&["/roll"]), 100);
        assert_eq!(upper_bound(&["/roll", "6"]), 6);
        assert_eq!(upper_bound(&["/roll", "six"]), 100);
        assert_eq!(upper_bound(&["/roll", "-3"]), 100);
    }

    #[test]
    fn test_roll_stays_in_range() {
        for _ in 0..200 {
            let n = roll(6);
            assert!((0..=6).contains(&n));
        }
        assert_eq!(roll(0), 0);
    }
}
