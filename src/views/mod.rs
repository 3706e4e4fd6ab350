//! Server-rendered views.
//!
//! Each view keeps its own state and renders a complete HTML fragment from it
//! on every call; nothing is patched incrementally.

pub mod login;
pub mod root;
pub mod task_item;
pub mod task_list;

pub use login::{AuthMode, LoginThrottle, LoginView, SubmitOutcome};
pub use root::RootView;
pub use task_item::{TaskIntent, TaskItemView};
pub use task_list::TaskListView;

/// Escapes text for use inside HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const STYLES: &str = r#"
body { margin: 0; min-height: 100vh; background: #121212; color: #FFFFFF;
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; }
.header { background: #000000; padding: 1rem 2rem; display: flex; justify-content: space-between;
  align-items: center; position: sticky; top: 0; box-shadow: 0 2px 4px rgba(0,0,0,.3); }
.user-info { font-weight: 500; }
button { border: none; border-radius: 500px; cursor: pointer; font-weight: 700; }
.primary, .sign-out-btn { background: #1DB954; color: #000000; padding: .75rem 1.5rem;
  text-transform: uppercase; letter-spacing: 1px; }
.primary:disabled { opacity: .7; cursor: not-allowed; }
.auth-container, .container { background: #181818; max-width: 420px; margin: 2rem auto; padding: 2.5rem;
  border-radius: 8px; box-shadow: 0 8px 24px rgba(0,0,0,.5); }
.container { max-width: 640px; }
.form-group { margin-bottom: 1.5rem; }
label { display: block; margin-bottom: .5rem; font-size: .875rem; font-weight: 600; }
input[type=email], input[type=password], input[type=text] { width: 100%; padding: .75rem 1rem;
  border: none; border-radius: 500px; background: #3E3E3E; color: #FFFFFF; box-sizing: border-box; }
input.error { background: #E91429; }
.error-message, .notice { margin-top: 1rem; padding: .75rem; background: #E91429; border-radius: 500px;
  text-align: center; font-size: .875rem; }
.toggle-btn { width: 100%; margin-top: 1rem; padding: .875rem; background: transparent; color: #B3B3B3;
  border: 1px solid #404040; }
.welcome-text, .empty-state, .stats { color: #B3B3B3; text-align: center; }
.todo-form { display: flex; gap: .75rem; margin-bottom: 1.5rem; }
.todo-item { display: flex; align-items: center; gap: .75rem; padding: .75rem 1rem; border-radius: 8px;
  background: #282828; margin-bottom: .5rem; }
.todo-item form { margin: 0; }
.todo-text { flex: 1; }
.todo-item.completed .todo-text { text-decoration: line-through; color: #B3B3B3; }
.checkbox { width: 1.25rem; height: 1.25rem; border-radius: 50%; border: 2px solid #1DB954;
  background: transparent; padding: 0; }
.checkbox.checked { background: #1DB954; }
.delete-btn { background: transparent; color: #B3B3B3; font-size: 1.25rem; }
.stats { display: flex; justify-content: space-between; margin-top: 1.5rem; font-size: .875rem; }
.spinner { display: inline-block; width: 14px; height: 14px; border: 2px solid #000000;
  border-top-color: transparent; border-radius: 50%; animation: spin 1s linear infinite; }
@keyframes spin { to { transform: rotate(360deg); } }
"#;

/// Wraps a rendered view in a complete HTML document.
pub fn page(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>My Tasks</title>
<style>{}</style>
</head>
<body>
{}
</body>
</html>"#,
        STYLES, body
    )
}
