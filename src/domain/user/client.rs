//! Users sub-client: CRUD and listing on `/v1/users`.

use crate::client::LunaClient;
use crate::domain::user::{User, UserCreate, UserUpdate, USER_ID_PREFIX};
use crate::error::SdkError;
use crate::http::{RequestConfig, RetryPolicy};
use crate::pagination::{Page, Paginator};
use crate::shared::{require, validate_id, ListParams};

const BASE_PATH: &str = "/v1/users";

/// Sub-client for user operations.
pub struct Users<'a> {
    pub(crate) client: &'a LunaClient,
}

impl<'a> Users<'a> {
    /// Fetch one page of users.
    pub async fn list(&self, params: &ListParams) -> Result<Page<User>, SdkError> {
        let config = params.apply(RequestConfig::get(BASE_PATH));
        self.client.http.request_json(config).await
    }

    /// Iterate over users, fetching pages on demand. Starts at
    /// `params.cursor` when one is set.
    pub fn iter(&self, params: ListParams) -> Paginator<User> {
        let http = self.client.http.clone();
        let start = params.cursor.clone();
        Paginator::new(move |cursor| {
            let http = http.clone();
            let params = ListParams {
                cursor,
                ..params.clone()
            };
            async move {
                http.request_json(params.apply(RequestConfig::get(BASE_PATH)))
                    .await
            }
        })
        .starting_at(start)
    }

    pub async fn get(&self, user_id: &str) -> Result<User, SdkError> {
        validate_id(user_id, USER_ID_PREFIX, "user ID")?;
        let config = RequestConfig::get(format!("{}/{}", BASE_PATH, user_id));
        self.client.http.request_json(config).await
    }

    /// Create a user. Not retried, since a replay could create a duplicate.
    pub async fn create(&self, data: &UserCreate) -> Result<User, SdkError> {
        require(&data.email, "email")?;
        require(&data.name, "name")?;
        let config = RequestConfig::post(BASE_PATH)
            .json(data)?
            .retry(RetryPolicy::None);
        self.client.http.request_json(config).await
    }

    pub async fn update(&self, user_id: &str, data: &UserUpdate) -> Result<User, SdkError> {
        validate_id(user_id, USER_ID_PREFIX, "user ID")?;
        let config = RequestConfig::patch(format!("{}/{}", BASE_PATH, user_id)).json(data)?;
        self.client.http.request_json(config).await
    }

    pub async fn delete(&self, user_id: &str) -> Result<(), SdkError> {
        validate_id(user_id, USER_ID_PREFIX, "user ID")?;
        self.client
            .http
            .request(RequestConfig::delete(format!("{}/{}", BASE_PATH, user_id)))
            .await?;
        Ok(())
    }
}
