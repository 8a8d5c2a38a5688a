//! Console command catalog expressed as a small grammar AST.
//!
//! The parser and the `help` command read the same table, so keywords,
//! defaults, and help text cannot drift apart.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Shoot,
    Cancel,
    Status,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceTag {
    ShootNow,
    ShootAfter,
    ShootEvery,
}

/// Value consumed after a choice keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSpec {
    None,
    /// `5`, `5s`, or `interval=5`.
    Seconds,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub usage: &'static str,
    pub summary: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    OptionalChoice {
        choices: &'static [ChoiceBranch],
        default: Option<ChoiceTag>,
    },
    Topic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChoiceBranch {
    pub keyword: &'static str,
    pub tag: ChoiceTag,
    pub value: ValueSpec,
}

const END: Node = Node::End;

const SHOOT_CHOICES: [ChoiceBranch; 3] = [
    ChoiceBranch {
        keyword: "now",
        tag: ChoiceTag::ShootNow,
        value: ValueSpec::None,
    },
    ChoiceBranch {
        keyword: "after",
        tag: ChoiceTag::ShootAfter,
        value: ValueSpec::Seconds,
    },
    ChoiceBranch {
        keyword: "every",
        tag: ChoiceTag::ShootEvery,
        value: ValueSpec::Seconds,
    },
];

const SHOOT_GRAMMAR: Node = Node::OptionalChoice {
    choices: &SHOOT_CHOICES,
    default: Some(ChoiceTag::ShootNow),
};

const HELP_GRAMMAR: Node = Node::Topic;

const COMMANDS: [CommandSpec; 4] = [
    CommandSpec {
        name: "shoot",
        tag: CommandTag::Shoot,
        grammar: &SHOOT_GRAMMAR,
        usage: "shoot [now | after <secs> | every <secs>]",
        summary: "fire the shutter now, once after a delay, or repeatedly",
    },
    CommandSpec {
        name: "cancel",
        tag: CommandTag::Cancel,
        grammar: &END,
        usage: "cancel",
        summary: "stop the armed delayed or repeating task",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        usage: "status",
        summary: "show the armed task and peer connectivity",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        usage: "help [command]",
        summary: "list commands or describe one",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

#[must_use]
pub const fn command(tag: CommandTag) -> &'static CommandSpec {
    match tag {
        CommandTag::Shoot => &COMMANDS[0],
        CommandTag::Cancel => &COMMANDS[1],
        CommandTag::Status => &COMMANDS[2],
        CommandTag::Help => &COMMANDS[3],
    }
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_tag_matches_table() {
        for spec in commands() {
            assert_eq!(command(spec.tag), spec);
        }
    }

    #[test]
    fn find_ignores_case() {
        assert_eq!(find("SHOOT").map(|spec| spec.tag), Some(CommandTag::Shoot));
        assert!(find("reboot").is_none());
    }
}
