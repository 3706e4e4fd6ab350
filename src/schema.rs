// Form body of the sign-in / register form
#[derive(Debug, serde::Deserialize)]
pub struct CredentialsSchema {
    pub email: String,
    pub password: String,
    // Only sent in register mode
    #[serde(default)]
    pub username: Option<String>,
}

// Form body for creating a new Todo
#[derive(Debug, serde::Deserialize)]
pub struct CreateTodoSchema {
    pub title: String,
}

// Form body for toggling a Todo; carries the state to switch to
#[derive(Debug, serde::Deserialize)]
pub struct ToggleTodoSchema {
    pub completed: bool,
}
