use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::view::ShortcutInfo;

/// Draw the header bar: brand, portal host, signed-in supplier, shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  portal_url: &str,
  supplier: Option<&str>,
  shortcuts: &[ShortcutInfo],
) {
  let mut spans = vec![
    Span::styled(" sportal ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", extract_domain(portal_url)),
      Style::default().fg(Color::White),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", supplier.unwrap_or("not signed in")),
      Style::default().fg(Color::Yellow).bold(),
    ),
    Span::raw(" "),
  ];

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);
  for shortcut in shortcuts {
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Host part of the portal URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(
      extract_domain("https://portal.example.com/"),
      "portal.example.com"
    );
    assert_eq!(
      extract_domain("https://suppliers.acme.test/portal/api"),
      "suppliers.acme.test"
    );
    assert_eq!(extract_domain("http://localhost:8080"), "localhost:8080");
  }
}
