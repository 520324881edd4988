pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
    },
    Command {
        name: "new",
        usage: "/new",
        help: "Start a new conversation and switch to it.",
    },
    Command {
        name: "sessions",
        usage: "/sessions",
        help: "List conversations; the active one is marked.",
    },
    Command {
        name: "switch",
        usage: "/switch <number|id>",
        help: "Switch to another conversation.",
    },
    Command {
        name: "copy",
        usage: "/copy [n]",
        help: "Copy the last reply, or its n-th code block.",
    },
    Command {
        name: "log",
        usage: "/log [filename]",
        help: "Log the transcript to a file, or toggle logging.",
    },
    Command {
        name: "dump",
        usage: "/dump [filename]",
        help: "Write the active conversation to a file.",
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the chat.",
    },
];
