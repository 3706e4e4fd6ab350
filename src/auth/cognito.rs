use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::{
    config::Region,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::{AttributeType, AuthFlowType},
    Client,
};
use base64::{engine::general_purpose, Engine};
use jsonwebtokens_cognito::KeySet;
use ring::hmac;
use serde_json::Value;

use super::{AuthError, AuthProvider};
use crate::{config::CognitoConfig, model::Session};

/// Cognito user pool backend.
///
/// Accounts are keyed by email. Registration signs the new user in right away
/// (after an admin confirmation when `COGNITO_AUTO_CONFIRM` is set), and the
/// identity of a session comes from the verified id token.
pub struct CognitoAuthProvider {
    client: Client,
    keyset: KeySet,
    config: CognitoConfig,
}

impl CognitoAuthProvider {
    pub async fn new(config: CognitoConfig) -> Result<Self, AuthError> {
        let sdk_config = aws_config::from_env()
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        let keyset = KeySet::new(config.region.clone(), config.user_pool_id.clone())
            .map_err(|err| AuthError::Other(format!("auth/keyset-unavailable: {:?}", err)))?;

        Ok(Self {
            client: Client::new(&sdk_config),
            keyset,
            config,
        })
    }

    fn secret_hash(&self, username: &str) -> Option<String> {
        self.config
            .client_secret
            .as_deref()
            .map(|secret| generate_secret_hash(secret, username, &self.config.client_id))
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut request = self
            .client
            .initiate_auth()
            .client_id(&self.config.client_id)
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .auth_parameters("USERNAME", email)
            .auth_parameters("PASSWORD", password);
        if let Some(hash) = self.secret_hash(email) {
            request = request.auth_parameters("SECRET_HASH", hash);
        }

        let response = request.send().await.map_err(map_sdk_error)?;
        let Some(result) = response.authentication_result() else {
            return Err(AuthError::Other(format!(
                "auth/challenge-required: {:?}",
                response.challenge_name()
            )));
        };
        let id_token = result
            .id_token()
            .ok_or_else(|| AuthError::Other("auth/missing-id-token".to_string()))?;
        let access_token = result
            .access_token()
            .ok_or_else(|| AuthError::Other("auth/missing-access-token".to_string()))?;

        let verifier = self
            .keyset
            .new_id_token_verifier(&[self.config.client_id.as_str()])
            .build()
            .map_err(|err| AuthError::Other(format!("auth/invalid-token: {:?}", err)))?;
        let claims = self
            .keyset
            .verify(id_token, &verifier)
            .await
            .map_err(|err| AuthError::Other(format!("auth/invalid-token: {:?}", err)))?;

        session_from_claims(&claims, email, access_token)
    }
}

#[async_trait]
impl AuthProvider for CognitoAuthProvider {
    async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Session, AuthError> {
        let email_attribute = attribute("email", email)?;
        let username_attribute = attribute("preferred_username", username)?;

        self.client
            .sign_up()
            .client_id(&self.config.client_id)
            .set_secret_hash(self.secret_hash(email))
            .username(email)
            .password(password)
            .user_attributes(email_attribute)
            .user_attributes(username_attribute)
            .send()
            .await
            .map_err(map_sdk_error)?;

        if self.config.auto_confirm {
            self.client
                .admin_confirm_sign_up()
                .user_pool_id(&self.config.user_pool_id)
                .username(email)
                .send()
                .await
                .map_err(map_sdk_error)?;
        }

        self.authenticate(email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.authenticate(email, password).await
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let Some(token) = &session.access_token else {
            return Ok(());
        };
        self.client
            .global_sign_out()
            .access_token(token.as_str())
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }
}

fn attribute(name: &str, value: &str) -> Result<AttributeType, AuthError> {
    AttributeType::builder()
        .name(name)
        .value(value)
        .build()
        .map_err(|err| AuthError::Other(err.to_string()))
}

fn map_sdk_error<E, R>(err: SdkError<E, R>) -> AuthError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let Some(service_error) = err.as_service_error() else {
        return AuthError::Other(DisplayErrorContext(&err).to_string());
    };
    let code = service_error.code().unwrap_or_default();
    let message = service_error.message().unwrap_or_default();

    match code {
        "UserNotFoundException" => AuthError::UserNotFound,
        "NotAuthorizedException" if message.contains("Incorrect username or password") => {
            AuthError::WrongPassword
        }
        "UsernameExistsException" | "AliasExistsException" => AuthError::EmailAlreadyInUse,
        "InvalidPasswordException" => AuthError::WeakPassword,
        "InvalidParameterException" if message.to_lowercase().contains("email") => {
            AuthError::InvalidEmail
        }
        _ => AuthError::Other(format!("{}: {}", code, message)),
    }
}

fn session_from_claims(
    claims: &Value,
    email: &str,
    access_token: &str,
) -> Result<Session, AuthError> {
    let user_id = claims
        .get("sub")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::Other("auth/invalid-token: missing sub".to_string()))?;
    let email = claims
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or(email);

    let mut session = Session::new(user_id, email).with_access_token(access_token);
    if let Some(name) = claims.get("preferred_username").and_then(Value::as_str) {
        session = session.with_display_name(name);
    }
    Ok(session)
}

fn generate_secret_hash(client_secret: &str, user_name: &str, client_id: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, client_secret.as_bytes());
    let msg = [user_name.as_bytes(), client_id.as_bytes()].concat();

    let signature = hmac::sign(&key, &msg);

    general_purpose::STANDARD.encode(signature.as_ref())
}
