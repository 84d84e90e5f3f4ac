//! Command palette entries and autocomplete ranking.

use crate::router::Route;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: CommandAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
  Open(Route),
  Logout,
  Quit,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "dashboard",
    aliases: &["d", "home"],
    description: "Summary of open work",
    action: CommandAction::Open(Route::Dashboard),
  },
  Command {
    name: "dispatch",
    aliases: &["do", "orders", "dispatches"],
    description: "Browse dispatch orders",
    action: CommandAction::Open(Route::DispatchOrders),
  },
  Command {
    name: "returns",
    aliases: &["r", "return", "rma"],
    description: "Browse and raise returns",
    action: CommandAction::Open(Route::Returns),
  },
  Command {
    name: "ledger",
    aliases: &["l", "account", "statement"],
    description: "Supplier ledger",
    action: CommandAction::Open(Route::Ledger),
  },
  Command {
    name: "logout",
    aliases: &["signout", "exit-session"],
    description: "Sign out and forget the stored token",
    action: CommandAction::Logout,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit sportal",
    action: CommandAction::Quit,
  },
];

/// Rank commands against `input`.
///
/// Exact name, exact alias, name prefix, alias prefix, then substring
/// matches, in that order.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut ranked: Vec<(&'static Command, u8)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();

  // Stable: ties keep declaration order
  ranked.sort_by_key(|(_, r)| *r);
  ranked.into_iter().map(|(cmd, _)| cmd).collect()
}

fn rank(cmd: &Command, input: &str) -> Option<u8> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Exact name or alias lookup
pub fn find(input: &str) -> Option<&'static Command> {
  let input = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == input || cmd.aliases.contains(&input.as_str()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_alias_beats_prefix() {
    // "r" is an alias of returns and a prefix of nothing else
    assert_eq!(get_suggestions("r")[0].name, "returns");
    // "d" is dashboard's alias even though "dispatch" starts with it
    let suggestions = get_suggestions("d");
    assert_eq!(suggestions[0].name, "dashboard");
    assert!(suggestions.iter().any(|c| c.name == "dispatch"));
  }

  #[test]
  fn test_prefix_and_substring() {
    assert_eq!(get_suggestions("led")[0].name, "ledger");
    assert_eq!(get_suggestions("patch")[0].name, "dispatch");
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_find() {
    assert_eq!(
      find(" Orders ").map(|c| c.action),
      Some(CommandAction::Open(Route::DispatchOrders))
    );
    assert_eq!(find("signout").map(|c| c.action), Some(CommandAction::Logout));
    assert!(find("ledg").is_none());
  }
}
