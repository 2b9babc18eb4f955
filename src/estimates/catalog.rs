//! Built-in estimate catalog.
//!
//! Work and Generic are split by shake strength: a gentle shake draws from the
//! gentle list, a hard shake (intensity >= 0.5) from the hard list. Humorous is
//! a single list reached only by the long-shake override.

pub const WORK_GENTLE: &[&str] = &[
    "2 hours",
    "by end of day",
    "tomorrow morning",
    "1 day",
    "2 days",
    "by Friday",
    "after standup",
    "half a sprint",
];

pub const WORK_HARD: &[&str] = &[
    "2 weeks",
    "next sprint",
    "a month",
    "next quarter",
    "after the reorg",
    "Q4, probably",
    "6 months",
    "when the migration is done",
];

pub const GENERIC_GENTLE: &[&str] = &[
    "5 minutes",
    "in a bit",
    "soon",
    "an hour",
    "later today",
    "tomorrow",
    "a couple of days",
];

pub const GENERIC_HARD: &[&str] = &[
    "a week",
    "a few weeks",
    "next month",
    "a few months",
    "eventually",
    "some day",
    "next year",
];

pub const HUMOROUS: &[&str] = &[
    "never",
    "when hell freezes over",
    "when pigs fly",
    "after the heat death of the universe",
    "2 weeks (it's always 2 weeks)",
    "ask again later",
    "once Mercury leaves retrograde",
    "right after the next rewrite",
    "the day after forever",
];
