use std::time::Duration;

use tokio::time::Instant;

use super::escape;
use crate::{
    auth::{AuthError, AuthGateway},
    model::Session,
};

pub const MAX_FAILED_ATTEMPTS: u32 = 3;
pub const LOCKOUT: Duration = Duration::from_secs(30);

/// Client-side guard against repeated failed submissions.
///
/// Once `max_failures` consecutive failures have been recorded, submissions
/// are refused until `lockout` has passed since the latest failure. Any
/// success resets the count. This is advisory; the provider is not told.
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    failures: u32,
    last_failure: Option<Instant>,
    max_failures: u32,
    lockout: Duration,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(MAX_FAILED_ATTEMPTS, LOCKOUT)
    }
}

impl LoginThrottle {
    pub fn new(max_failures: u32, lockout: Duration) -> Self {
        Self {
            failures: 0,
            last_failure: None,
            max_failures,
            lockout,
        }
    }

    /// `Err` carries how long the caller still has to wait.
    pub fn check(&self, now: Instant) -> Result<(), Duration> {
        match self.last_failure {
            Some(last) if self.failures >= self.max_failures => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.lockout {
                    Err(self.lockout - elapsed)
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.failures += 1;
        self.last_failure = Some(now);
    }

    pub fn reset(&mut self) {
        self.failures = 0;
        self.last_failure = None;
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.max_failures.saturating_sub(self.failures)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Password,
    Username,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Feedback {
    message: String,
    field: Option<Field>,
}

#[derive(Debug)]
enum FormError {
    Auth(AuthError),
    MissingUsername,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Signed in; the root view switches screens through its subscription.
    Success(Session),
    Rejected,
    Throttled { retry_in: Duration },
}

fn describe(err: &FormError, remaining_attempts: u32) -> Feedback {
    let (message, field) = match err {
        FormError::Auth(AuthError::UserNotFound) => (
            "No account found with this email. Would you like to create one?".to_string(),
            Some(Field::Email),
        ),
        FormError::Auth(AuthError::WrongPassword) => (
            format!(
                "Incorrect password. {} attempts remaining.",
                remaining_attempts
            ),
            Some(Field::Password),
        ),
        FormError::Auth(AuthError::EmailAlreadyInUse) => (
            "This email is already registered. Please sign in instead.".to_string(),
            Some(Field::Email),
        ),
        FormError::Auth(AuthError::InvalidEmail) => (
            "Please enter a valid email address (e.g., user@example.com)".to_string(),
            Some(Field::Email),
        ),
        FormError::Auth(AuthError::WeakPassword) => (
            "Password must be at least 6 characters and include both letters and numbers"
                .to_string(),
            Some(Field::Password),
        ),
        FormError::Auth(AuthError::Other(message)) => (message.clone(), None),
        FormError::MissingUsername => (
            "Please enter a username".to_string(),
            Some(Field::Username),
        ),
    };
    Feedback { message, field }
}

/// Sign-in / sign-up form.
pub struct LoginView {
    gateway: AuthGateway,
    mode: AuthMode,
    throttle: LoginThrottle,
    feedback: Option<Feedback>,
    email: String,
    username: String,
}

impl LoginView {
    pub fn new(gateway: AuthGateway) -> Self {
        Self {
            gateway,
            mode: AuthMode::Login,
            throttle: LoginThrottle::default(),
            feedback: None,
            email: String::new(),
            username: String::new(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn message(&self) -> Option<&str> {
        self.feedback.as_ref().map(|f| f.message.as_str())
    }

    pub fn highlighted_field(&self) -> Option<Field> {
        self.feedback.as_ref().and_then(|f| f.field)
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        self.feedback = None;
    }

    pub async fn submit(
        &mut self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> SubmitOutcome {
        if let Err(retry_in) = self.throttle.check(Instant::now()) {
            let seconds = retry_in.as_secs() + u64::from(retry_in.subsec_nanos() > 0);
            self.feedback = Some(Feedback {
                message: format!(
                    "Too many attempts. Please try again in {} seconds.",
                    seconds
                ),
                field: None,
            });
            return SubmitOutcome::Throttled { retry_in };
        }

        self.email = email.trim().to_string();
        self.username = username.unwrap_or_default().trim().to_string();

        let result = match self.mode {
            AuthMode::Login => self
                .gateway
                .sign_in(&self.email, password)
                .await
                .map_err(FormError::Auth),
            AuthMode::Register if self.username.is_empty() => Err(FormError::MissingUsername),
            AuthMode::Register => self
                .gateway
                .register(&self.email, password, &self.username)
                .await
                .map_err(FormError::Auth),
        };

        match result {
            Ok(session) => {
                self.throttle.reset();
                self.feedback = None;
                SubmitOutcome::Success(session)
            }
            Err(err) => {
                self.throttle.record_failure(Instant::now());
                tracing::warn!(error = ?err, mode = ?self.mode, "credential submission failed");
                self.feedback = Some(describe(&err, self.throttle.remaining_attempts()));
                SubmitOutcome::Rejected
            }
        }
    }

    fn input_class(&self, field: Field) -> &'static str {
        if self.highlighted_field() == Some(field) {
            r#" class="error" autofocus"#
        } else {
            ""
        }
    }

    pub fn render(&self) -> String {
        let login = self.mode == AuthMode::Login;
        let (heading, welcome, progress, toggle) = if login {
            (
                "Sign In",
                "Sign in to manage your tasks and stay organized",
                "Signing in...",
                "Need an account? Sign Up",
            )
        } else {
            (
                "Sign Up",
                "Create an account to start managing your tasks",
                "Creating account...",
                "Already have an account? Sign In",
            )
        };

        let username_group = if login {
            String::new()
        } else {
            format!(
                r#"<div class="form-group">
      <label for="username">Username</label>
      <input type="text" id="username" name="username" placeholder="Choose a username" required autocomplete="username" value="{}"{}>
    </div>"#,
                escape(&self.username),
                self.input_class(Field::Username),
            )
        };
        let error = self
            .feedback
            .as_ref()
            .map(|f| {
                format!(
                    r#"<div class="error-message" role="alert">{}</div>"#,
                    escape(&f.message)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<div class="auth-container">
  <h2>{heading}</h2>
  <p class="welcome-text">{welcome}</p>
  <form method="post" action="/auth" onsubmit="var b=this.querySelector('button[type=submit]');b.disabled=true;b.innerHTML='<span class=spinner></span> '+b.dataset.progress;">
    <div class="form-group">
      <label for="email">Email Address</label>
      <input type="email" id="email" name="email" placeholder="Enter your email" required autocomplete="email" value="{email}"{email_class}>
    </div>
    {username_group}
    <div class="form-group">
      <label for="password">Password</label>
      <input type="password" id="password" name="password" placeholder="Enter your password" required autocomplete="current-password"{password_class}>
    </div>
    <button type="submit" class="primary" data-progress="{progress}">{heading}</button>
    {error}
  </form>
  <div class="divider">or</div>
  <form method="post" action="/auth/mode">
    <button type="submit" class="toggle-btn">{toggle}</button>
  </form>
</div>"#,
            email = escape(&self.email),
            email_class = self.input_class(Field::Email),
            password_class = self.input_class(Field::Password),
        )
    }
}
