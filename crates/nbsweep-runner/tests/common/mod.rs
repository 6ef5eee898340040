//! Shared fixtures: an in-process catalog and forge server plus notebook builders.

#![allow(dead_code)]

use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
use nbsweep_lib::notebook::{Cell, Notebook};
use nbsweep_runner::config::HarnessConfig;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Root listing served for a repository, or the status to answer with.
#[derive(Clone)]
pub enum Listing {
    Files(Vec<&'static str>),
    Status(StatusCode),
}

/// Serves `/js/learning.json` and `/repos/{owner}/{name}/contents`.
pub struct ForgeFixture {
    pub catalog: Value,
    pub catalog_down: bool,
    pub listings: HashMap<String, Listing>,
}

impl ForgeFixture {
    pub fn new() -> Self {
        Self {
            catalog: json!({ "data": [] }),
            catalog_down: false,
            listings: HashMap::new(),
        }
    }

    /// Add a catalog entry and the root listing its repository answers with.
    pub fn repository(mut self, owner: &str, name: &str, listing: Listing) -> Self {
        let url = format!("https://github.com/{owner}/{name}");
        self.push_resource(json!({ "url": url, "title": name }));
        self.listings.insert(format!("{owner}/{name}"), listing);
        self
    }

    /// Add a catalog entry that is not hosted on the forge.
    pub fn resource(mut self, url: &str) -> Self {
        self.push_resource(json!({ "url": url }));
        self
    }

    /// Answer the catalog request with a server error.
    pub fn catalog_down(mut self) -> Self {
        self.catalog_down = true;
        self
    }

    fn push_resource(&mut self, resource: Value) {
        if let Some(data) = self.catalog["data"].as_array_mut() {
            data.push(resource);
        }
    }

    /// Start the server and return its base url.
    pub async fn serve(self) -> String {
        let catalog = Arc::new((!self.catalog_down).then_some(self.catalog));
        let listings = Arc::new(self.listings);

        let router = Router::new()
            .route(
                "/js/learning.json",
                get(move || {
                    let catalog = catalog.clone();
                    async move {
                        match catalog.as_ref() {
                            Some(body) => Ok(Json(body.clone())),
                            None => Err(StatusCode::INTERNAL_SERVER_ERROR),
                        }
                    }
                }),
            )
            .route(
                "/repos/{owner}/{name}/contents",
                get(move |Path((owner, name)): Path<(String, String)>| {
                    let listings = listings.clone();
                    async move {
                        match listings.get(&format!("{owner}/{name}")) {
                            Some(Listing::Files(files)) => {
                                let entries: Vec<Value> = files
                                    .iter()
                                    .map(|file| json!({ "name": file, "type": "file" }))
                                    .collect();
                                Ok(Json(Value::Array(entries)))
                            }
                            Some(Listing::Status(status)) => Err(*status),
                            None => Err(StatusCode::NOT_FOUND),
                        }
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }
}

/// Config pointing every remote at `base` and the workspace at `workspace`.
pub fn config_for(base: &str, workspace: &TempDir) -> HarnessConfig {
    HarnessConfig {
        workspace: workspace.path().to_path_buf(),
        catalog_url: format!("{base}/js/learning.json"),
        forge_api_root: base.to_string(),
        execution_timeout_secs: 5,
        http_timeout_secs: 5,
        ..Default::default()
    }
}

pub fn notebook_json(kernel: &str, sources: &[&str]) -> String {
    let cells = sources.iter().map(|source| Cell::code(*source)).collect();
    serde_json::to_string(&Notebook::new(kernel, cells)).unwrap()
}

pub fn read_log(workspace: &TempDir) -> String {
    std::fs::read_to_string(workspace.path().join("tests").join("LOG.txt")).unwrap()
}
