//! Button rows and their custom ids.
//!
//! Every button carries everything its handler needs in the custom id, so a
//! click can be handled without any server-side lookup of the message. Review
//! buttons include the step they were offered at, which is how stale clicks
//! are recognised.

use crate::{
    core::chat::{Controls, Verdict},
    entities::Currency,
};
use poise::serenity_prelude::{ButtonStyle, CreateActionRow, CreateButton};

/// What a button press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Cancel,
    Skip,
    Currency(Currency),
    /// Inspector decision on `order_id` at `step`
    Review {
        verdict: Verdict,
        order_id: i64,
        step: i32,
    },
    /// Payeer decision on `order_id` at `step`
    Payment {
        verdict: Verdict,
        order_id: i64,
        step: i32,
    },
}

impl Action {
    /// Encodes the action as a component custom id.
    #[must_use]
    pub fn custom_id(&self) -> String {
        match self {
            Self::Cancel => "cancel".to_string(),
            Self::Skip => "skip".to_string(),
            Self::Currency(currency) => format!("currency:{}", currency.code()),
            Self::Review {
                verdict,
                order_id,
                step,
            } => format!("review:{}:{order_id}:{step}", verdict_code(*verdict)),
            Self::Payment {
                verdict,
                order_id,
                step,
            } => format!("pay:{}:{order_id}:{step}", verdict_code(*verdict)),
        }
    }

    /// Decodes a custom id; anything malformed yields `None`.
    #[must_use]
    pub fn parse(custom_id: &str) -> Option<Self> {
        let parts: Vec<&str> = custom_id.split(':').collect();
        match parts.as_slice() {
            ["cancel"] => Some(Self::Cancel),
            ["skip"] => Some(Self::Skip),
            ["currency", code] => Currency::from_code(code).map(Self::Currency),
            [kind @ ("review" | "pay"), verdict, order_id, step] => {
                let verdict = parse_verdict(verdict)?;
                let order_id = order_id.parse().ok()?;
                let step = step.parse().ok()?;
                Some(if *kind == "review" {
                    Self::Review {
                        verdict,
                        order_id,
                        step,
                    }
                } else {
                    Self::Payment {
                        verdict,
                        order_id,
                        step,
                    }
                })
            }
            _ => None,
        }
    }

    /// The decision carried by a review or payment button.
    #[must_use]
    pub const fn decision(&self) -> Option<(Verdict, i64, i32)> {
        match *self {
            Self::Review {
                verdict,
                order_id,
                step,
            }
            | Self::Payment {
                verdict,
                order_id,
                step,
            } => Some((verdict, order_id, step)),
            _ => None,
        }
    }
}

const fn verdict_code(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Approve => "approve",
        Verdict::Reject => "reject",
    }
}

fn parse_verdict(code: &str) -> Option<Verdict> {
    match code {
        "approve" => Some(Verdict::Approve),
        "reject" => Some(Verdict::Reject),
        _ => None,
    }
}

fn button(action: Action, label: &str, style: ButtonStyle) -> CreateButton {
    CreateButton::new(action.custom_id()).label(label).style(style)
}

/// Builds the button row for a set of controls.
#[must_use]
pub fn action_rows(controls: &Controls) -> Vec<CreateActionRow> {
    let buttons = match *controls {
        Controls::Review { order_id, step } => vec![
            button(
                Action::Review {
                    verdict: Verdict::Approve,
                    order_id,
                    step,
                },
                "Approve",
                ButtonStyle::Success,
            ),
            button(
                Action::Review {
                    verdict: Verdict::Reject,
                    order_id,
                    step,
                },
                "Reject",
                ButtonStyle::Danger,
            ),
        ],
        Controls::Payment { order_id, step } => vec![
            button(
                Action::Payment {
                    verdict: Verdict::Approve,
                    order_id,
                    step,
                },
                "Pay",
                ButtonStyle::Success,
            ),
            button(
                Action::Payment {
                    verdict: Verdict::Reject,
                    order_id,
                    step,
                },
                "Reject",
                ButtonStyle::Danger,
            ),
        ],
        Controls::Currency => vec![
            button(Action::Currency(Currency::Rub), "RUB", ButtonStyle::Primary),
            button(Action::Currency(Currency::Usd), "USD", ButtonStyle::Primary),
            button(Action::Cancel, "Cancel", ButtonStyle::Secondary),
        ],
        Controls::SkipOrCancel => vec![
            button(Action::Skip, "Skip", ButtonStyle::Primary),
            button(Action::Cancel, "Cancel", ButtonStyle::Secondary),
        ],
        Controls::Cancel => vec![button(Action::Cancel, "Cancel", ButtonStyle::Secondary)],
    };
    vec![CreateActionRow::Buttons(buttons)]
}
