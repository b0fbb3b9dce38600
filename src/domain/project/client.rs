//! Projects sub-client.

use crate::client::LunaClient;
use crate::domain::project::{Project, ProjectCreate, ProjectUpdate, PROJECT_ID_PREFIX};
use crate::error::SdkError;
use crate::http::{RequestConfig, RetryPolicy};
use crate::pagination::{Page, Paginator};
use crate::shared::{require, validate_id, ListParams};

const BASE_PATH: &str = "/v1/projects";

pub struct Projects<'a> {
    pub(crate) client: &'a LunaClient,
}

impl<'a> Projects<'a> {
    pub async fn list(&self, params: &ListParams) -> Result<Page<Project>, SdkError> {
        let config = params.apply(RequestConfig::get(BASE_PATH));
        self.client.http.request_json(config).await
    }

    pub fn iter(&self, params: ListParams) -> Paginator<Project> {
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

    pub async fn get(&self, project_id: &str) -> Result<Project, SdkError> {
        validate_id(project_id, PROJECT_ID_PREFIX, "project ID")?;
        let config = RequestConfig::get(format!("{}/{}", BASE_PATH, project_id));
        self.client.http.request_json(config).await
    }

    pub async fn create(&self, data: &ProjectCreate) -> Result<Project, SdkError> {
        require(&data.name, "name")?;
        let config = RequestConfig::post(BASE_PATH)
            .json(data)?
            .retry(RetryPolicy::None);
        self.client.http.request_json(config).await
    }

    pub async fn update(
        &self,
        project_id: &str,
        data: &ProjectUpdate,
    ) -> Result<Project, SdkError> {
        validate_id(project_id, PROJECT_ID_PREFIX, "project ID")?;
        let config =
            RequestConfig::patch(format!("{}/{}", BASE_PATH, project_id)).json(data)?;
        self.client.http.request_json(config).await
    }

    pub async fn delete(&self, project_id: &str) -> Result<(), SdkError> {
        validate_id(project_id, PROJECT_ID_PREFIX, "project ID")?;
        self.client
            .http
            .request(RequestConfig::delete(format!("{}/{}", BASE_PATH, project_id)))
            .await?;
        Ok(())
    }
}
