//! HTTP implementation of the volume store and instance directory for the
//! QingCloud IaaS API.

mod signer;
pub(crate) mod wire;

use std::future::Future;

use chrono::Utc;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::{
    CreateVolumes, InstanceDirectory, StoreAction, StoreError, StoreFuture, VolumeQuery,
    VolumeSet, VolumeStore,
};
use crate::config::{CloudConfig, ConfigError};
use crate::volume::{Instance, Volume};
use signer::{Signer, TIME_STAMP_FORMAT};
use wire::{
    Acknowledged, CreateVolumesReply, DescribeInstancesReply, DescribeVolumesReply, Params,
    WireVolume,
};

/// Store backed by the QingCloud HTTP API. Every call is signed with the
/// configured secret key.
///
/// Clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct QingCloudStore {
    client: reqwest::Client,
    endpoint: Url,
    zone: String,
    signer: Signer,
}

impl QingCloudStore {
    /// Constructs a store from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation, the
    /// endpoint is not a URL, or the HTTP client cannot be built.
    pub fn new(config: &CloudConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let endpoint = Url::parse(&config.api_endpoint).map_err(|err| {
            ConfigError::Client(format!("invalid API endpoint {}: {err}", config.api_endpoint))
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| ConfigError::Client(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            zone: config.zone.clone(),
            signer: Signer::new(
                config.access_key_id.clone(),
                config.secret_access_key.clone(),
            ),
        })
    }

    fn signed_url(&self, action: StoreAction, params: Params) -> Result<Url, StoreError> {
        let mut query: Params = vec![
            (String::from("action"), action.as_str().to_owned()),
            (String::from("zone"), self.zone.clone()),
        ];
        query.extend(params);
        let time_stamp = Utc::now().format(TIME_STAMP_FORMAT).to_string();
        let signed = self
            .signer
            .signed_query(self.endpoint.path(), query, &time_stamp)
            .map_err(|err| StoreError::transport(action, format!("cannot sign request: {err}")))?;
        let mut url = self.endpoint.clone();
        url.set_query(Some(&signed));
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: StoreAction,
        params: Params,
    ) -> Result<T, StoreError> {
        let url = self.signed_url(action, params)?;
        debug!(%action, zone = %self.zone, "calling store");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| StoreError::transport(action, err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| StoreError::transport(action, err.to_string()))?;
        wire::parse_reply(action, status.as_u16(), &body)
    }
}

impl VolumeStore for QingCloudStore {
    fn zone(&self) -> &str {
        &self.zone
    }

    fn describe_volumes<'a>(&'a self, query: &'a VolumeQuery) -> StoreFuture<'a, VolumeSet> {
        Box::pin(async move {
            let action = StoreAction::DescribeVolumes;
            let rows = match query {
                VolumeQuery::ById(_) => {
                    let reply: DescribeVolumesReply = self
                        .call(action, wire::describe_volumes_params(query, 0))
                        .await?;
                    reply.volume_set
                }
                VolumeQuery::ByName { .. } => {
                    fetch_pages(|offset| {
                        self.call(action, wire::describe_volumes_params(query, offset))
                    })
                    .await?
                }
            };
            let mut volumes = rows
                .into_iter()
                .map(|volume| volume.into_volume(action))
                .collect::<Result<Vec<Volume>, StoreError>>()?;

            // `search_word` is a keyword match; keep exact names only.
            if let VolumeQuery::ByName { name, .. } = query {
                volumes.retain(|volume| &volume.name == name);
            }
            Ok(VolumeSet {
                total_count: volumes.len(),
                volumes,
            })
        })
    }

    fn create_volumes<'a>(&'a self, request: &'a CreateVolumes) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            let reply: CreateVolumesReply = self
                .call(
                    StoreAction::CreateVolumes,
                    wire::create_volumes_params(request),
                )
                .await?;
            Ok(reply.volumes)
        })
    }

    fn delete_volumes<'a>(&'a self, volume_ids: &'a [String]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _: Acknowledged = self
                .call(StoreAction::DeleteVolumes, wire::volumes_params(volume_ids))
                .await?;
            Ok(())
        })
    }

    fn attach_volumes<'a>(
        &'a self,
        volume_ids: &'a [String],
        instance_id: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _: Acknowledged = self
                .call(
                    StoreAction::AttachVolumes,
                    wire::attachment_params(volume_ids, instance_id),
                )
                .await?;
            Ok(())
        })
    }

    fn detach_volumes<'a>(
        &'a self,
        volume_ids: &'a [String],
        instance_id: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _: Acknowledged = self
                .call(
                    StoreAction::DetachVolumes,
                    wire::attachment_params(volume_ids, instance_id),
                )
                .await?;
            Ok(())
        })
    }
}

/// Reads `DescribeVolumes` pages until `total_count` rows have arrived or a
/// page comes back empty.
async fn fetch_pages<F, Fut>(mut fetch: F) -> Result<Vec<WireVolume>, StoreError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<DescribeVolumesReply, StoreError>>,
{
    let mut rows = Vec::new();
    loop {
        let page = fetch(rows.len()).await?;
        let done = page.volume_set.is_empty()
            || rows.len().saturating_add(page.volume_set.len()) >= page.total_count;
        rows.extend(page.volume_set);
        if done {
            return Ok(rows);
        }
    }
}

impl InstanceDirectory for QingCloudStore {
    fn find_instance<'a>(&'a self, instance_id: &'a str) -> StoreFuture<'a, Option<Instance>> {
        Box::pin(async move {
            let reply: DescribeInstancesReply = self
                .call(
                    StoreAction::DescribeInstances,
                    wire::describe_instances_params(instance_id),
                )
                .await?;
            Ok(reply.is_live(instance_id).then(|| Instance {
                id: instance_id.to_owned(),
            }))
        })
    }
}
