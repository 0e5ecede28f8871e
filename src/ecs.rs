//! Amazon ECS container metadata lookup.
//!
//! When horenso runs inside an ECS task the hostname is a meaningless
//! container id, so the Slack message also names the cluster, task and
//! container taken from the task metadata endpoint (version 3 or later).

use serde::Deserialize;
use tracing::{debug, warn};

/// Identifies the ECS container a report came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcsMetadata {
    pub cluster: String,
    pub task_arn: String,
    pub container_name: String,
}

#[derive(Debug, Deserialize)]
struct ContainerMetadata {
    #[serde(rename = "DockerId")]
    docker_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskContainer {
    #[serde(rename = "DockerId")]
    docker_id: String,
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct TaskMetadata {
    #[serde(rename = "Cluster")]
    cluster: String,
    #[serde(rename = "TaskARN")]
    task_arn: String,
    #[serde(rename = "Containers", default)]
    containers: Vec<TaskContainer>,
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, reqwest::Error> {
    client.get(url).send().await?.error_for_status()?.json().await
}

/// Fetches the metadata of the container this process runs in.
///
/// Returns `Ok(None)` when the task does not list the current container.
pub async fn fetch_metadata(
    client: &reqwest::Client,
    metadata_uri: &str,
) -> Result<Option<EcsMetadata>, reqwest::Error> {
    let container: ContainerMetadata = get_json(client, metadata_uri).await?;
    let task: TaskMetadata = get_json(client, &format!("{}/task", metadata_uri)).await?;

    Ok(task
        .containers
        .into_iter()
        .find(|c| c.docker_id == container.docker_id)
        .map(|c| EcsMetadata {
            cluster: task.cluster,
            task_arn: task.task_arn,
            container_name: c.name,
        }))
}

/// Like [`fetch_metadata`], but a failed lookup only logs a warning.
pub async fn lookup(client: &reqwest::Client, metadata_uri: Option<&str>) -> Option<EcsMetadata> {
    let uri = metadata_uri?;
    match fetch_metadata(client, uri).await {
        Ok(Some(meta)) => {
            debug!(cluster = %meta.cluster, container = %meta.container_name, "Running in ECS");
            Some(meta)
        }
        Ok(None) => {
            warn!(uri, "Current container not found in ECS task metadata");
            None
        }
        Err(e) => {
            warn!(uri, error = %e, "Failed to get ECS metadata");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const METADATA_PATH: &str = "/v3/20ed294b-9e28-499d-b4f6-33848085dd98";

    async fn metadata_server(container_id: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "DockerId": container_id,
                "Name": "app",
                "Image": "example/app:latest",
                "KnownStatus": "RUNNING"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/task", METADATA_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Cluster": "api",
                "TaskARN": "arn:aws:ecs:ap-northeast-1:999999999999:task/965d53cd-8dd8-483a-b9c6-f0910c3892a4",
                "Family": "app",
                "Revision": "12",
                "Containers": [
                    {"DockerId": "sidecar0000", "Name": "log-router"},
                    {"DockerId": "43481a6ce4842eec8fe72fc28500c6b52edcc0917f105b83379f88cac1ff3946", "Name": "app"}
                ]
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_fetch_metadata_matches_container() {
        let server = metadata_server(
            "43481a6ce4842eec8fe72fc28500c6b52edcc0917f105b83379f88cac1ff3946",
        )
        .await;
        let client = reqwest::Client::new();
        let uri = format!("{}{}", server.uri(), METADATA_PATH);

        let meta = fetch_metadata(&client, &uri).await.unwrap();
        assert_eq!(
            meta,
            Some(EcsMetadata {
                cluster: "api".to_string(),
                task_arn: "arn:aws:ecs:ap-northeast-1:999999999999:task/965d53cd-8dd8-483a-b9c6-f0910c3892a4".to_string(),
                container_name: "app".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_fetch_metadata_unknown_container() {
        let server = metadata_server("unknown").await;
        let client = reqwest::Client::new();
        let uri = format!("{}{}", server.uri(), METADATA_PATH);
        assert_eq!(fetch_metadata(&client, &uri).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_without_uri() {
        let client = reqwest::Client::new();
        assert_eq!(lookup(&client, None).await, None);
    }

    #[tokio::test]
    async fn test_lookup_swallows_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let client = reqwest::Client::new();
        let uri = format!("{}{}", server.uri(), METADATA_PATH);
        assert_eq!(lookup(&client, Some(&uri)).await, None);
    }
}
