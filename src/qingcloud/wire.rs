//! Request parameters and reply decoding for the QingCloud IaaS API.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::backend::{CreateVolumes, RETRY_MARKER, StoreAction, StoreError, VolumeQuery};
use crate::volume::{Attachment, Volume, VolumeStatus};

/// Query pairs appended to the common `action`/`zone`/`access_key_id` set.
pub(crate) type Params = Vec<(String, String)>;

/// Rows requested per `DescribeVolumes` page.
pub(crate) const PAGE_LIMIT: usize = 100;

/// Instance statuses that count as gone.
const GONE_INSTANCE_STATUSES: [&str; 2] = ["terminated", "ceased"];

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    ret_code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DescribeVolumesReply {
    #[serde(default)]
    pub(crate) total_count: usize,
    #[serde(default)]
    pub(crate) volume_set: Vec<WireVolume>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireVolume {
    volume_id: String,
    #[serde(default)]
    volume_name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    volume_type: i32,
    status: String,
    #[serde(default)]
    instance: Option<WireInstanceRef>,
}

/// Attachment reference. The store reports an empty id once a volume has
/// been detached.
#[derive(Debug, Deserialize)]
struct WireInstanceRef {
    #[serde(default)]
    instance_id: String,
    #[serde(default)]
    device: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateVolumesReply {
    #[serde(default)]
    pub(crate) volumes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DescribeInstancesReply {
    #[serde(default)]
    instance_set: Vec<WireInstance>,
}

#[derive(Debug, Deserialize)]
struct WireInstance {
    instance_id: String,
    #[serde(default)]
    status: String,
}

/// Reply with no payload beyond the envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Acknowledged {}

impl WireVolume {
    pub(crate) fn into_volume(self, action: StoreAction) -> Result<Volume, StoreError> {
        let status = self.status.parse::<VolumeStatus>().map_err(|err| {
            StoreError::transport(action, format!("volume {}: {err}", self.volume_id))
        })?;
        let attachment = self
            .instance
            .filter(|instance| !instance.instance_id.trim().is_empty())
            .map(|instance| Attachment {
                instance_id: instance.instance_id,
                device: instance.device,
            });
        Ok(Volume {
            id: self.volume_id,
            name: self.volume_name,
            size_gb: self.size,
            volume_type: self.volume_type,
            status,
            attachment,
        })
    }
}

impl DescribeInstancesReply {
    pub(crate) fn is_live(&self, instance_id: &str) -> bool {
        self.instance_set.iter().any(|instance| {
            instance.instance_id == instance_id
                && !GONE_INSTANCE_STATUSES.contains(&instance.status.as_str())
        })
    }
}

/// Decodes a reply body, separating transport from business failures.
///
/// A non-2xx status or an undecodable body is a transport failure; a decoded
/// envelope with a non-zero `ret_code` is a business failure, except when the
/// store asks to try later, which is reported as a retryable transport
/// failure.
pub(crate) fn parse_reply<T: DeserializeOwned>(
    action: StoreAction,
    http_status: u16,
    body: &str,
) -> Result<T, StoreError> {
    if !(200..300).contains(&http_status) {
        return Err(StoreError::transport(
            action,
            format!("HTTP {http_status}: {}", body.trim()),
        ));
    }
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|err| StoreError::transport(action, format!("malformed reply: {err}")))?;
    if envelope.ret_code != 0 {
        if envelope.message.to_ascii_lowercase().contains(RETRY_MARKER) {
            return Err(StoreError::transport(
                action,
                format!("ret_code {}: {}", envelope.ret_code, envelope.message),
            ));
        }
        return Err(StoreError::business(
            action,
            envelope.ret_code,
            envelope.message,
        ));
    }
    serde_json::from_str(body)
        .map_err(|err| StoreError::transport(action, format!("malformed reply: {err}")))
}

fn indexed(prefix: &str, values: impl IntoIterator<Item = String>) -> Params {
    values
        .into_iter()
        .zip(1_u32..)
        .map(|(value, index)| (format!("{prefix}.{index}"), value))
        .collect()
}

/// Parameters for one page of a describe. `offset` only applies to name
/// searches; id lookups return at most one row.
pub(crate) fn describe_volumes_params(query: &VolumeQuery, offset: usize) -> Params {
    match query {
        VolumeQuery::ById(volume_id) => indexed("volumes", [volume_id.clone()]),
        VolumeQuery::ByName { name, statuses } => {
            let mut params = vec![
                (String::from("search_word"), name.clone()),
                (String::from("limit"), PAGE_LIMIT.to_string()),
                (String::from("offset"), offset.to_string()),
            ];
            params.extend(indexed(
                "status",
                statuses.iter().map(|status| status.as_str().to_owned()),
            ));
            params
        }
    }
}

pub(crate) fn create_volumes_params(request: &CreateVolumes) -> Params {
    vec![
        (String::from("volume_name"), request.name.clone()),
        (String::from("size"), request.size_gb.to_string()),
        (String::from("volume_type"), request.volume_type.to_string()),
        (String::from("count"), request.count.to_string()),
    ]
}

pub(crate) fn volumes_params(volume_ids: &[String]) -> Params {
    indexed("volumes", volume_ids.iter().cloned())
}

pub(crate) fn attachment_params(volume_ids: &[String], instance_id: &str) -> Params {
    let mut params = volumes_params(volume_ids);
    params.push((String::from("instance"), instance_id.to_owned()));
    params
}

pub(crate) fn describe_instances_params(instance_id: &str) -> Params {
    indexed("instances", [instance_id.to_owned()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BUSY_REPLY: &str =
        r#"{"ret_code": 5100, "message": "resource [vol-1] is busy, please try later"}"#;

    const VOLUMES_REPLY: &str = r#"{
        "action": "DescribeVolumesResponse",
        "total_count": 2,
        "volume_set": [
            {
                "volume_id": "vol-attached",
                "volume_name": "pvc-1",
                "size": 30,
                "volume_type": 2,
                "status": "in-use",
                "instance": {"instance_id": "i-node1", "device": "/dev/vdc"}
            },
            {
                "volume_id": "vol-free",
                "volume_name": "pvc-10",
                "size": 10,
                "volume_type": 0,
                "status": "available",
                "instance": {"instance_id": "", "device": ""}
            }
        ],
        "ret_code": 0
    }"#;

    fn decode_volumes() -> Vec<Volume> {
        let reply: DescribeVolumesReply =
            parse_reply(StoreAction::DescribeVolumes, 200, VOLUMES_REPLY).expect("valid reply");
        reply
            .volume_set
            .into_iter()
            .map(|volume| volume.into_volume(StoreAction::DescribeVolumes))
            .collect::<Result<_, _>>()
            .expect("known statuses")
    }

    #[test]
    fn describe_reply_maps_attachment() {
        let volumes = decode_volumes();
        let attached = volumes.first().expect("first volume");
        assert_eq!(attached.status, VolumeStatus::InUse);
        assert_eq!(
            attached.attachment,
            Some(Attachment {
                instance_id: String::from("i-node1"),
                device: String::from("/dev/vdc"),
            })
        );
    }

    #[test]
    fn empty_instance_reference_means_detached() {
        let volumes = decode_volumes();
        let free = volumes.get(1).expect("second volume");
        assert_eq!(free.attachment, None);
        assert_eq!(free.size_gb, 10);
    }

    #[test]
    fn non_zero_ret_code_is_a_business_failure() {
        let body = r#"{"ret_code": 2100, "message": "resource [vol-1] is attached"}"#;
        let err = parse_reply::<Acknowledged>(StoreAction::DetachVolumes, 200, body)
            .expect_err("ret_code is non-zero");
        assert_eq!(
            err,
            StoreError::business(StoreAction::DetachVolumes, 2100, "resource [vol-1] is attached")
        );
    }

    #[test]
    fn try_later_ret_code_is_retryable() {
        let err = parse_reply::<Acknowledged>(StoreAction::DeleteVolumes, 200, BUSY_REPLY)
            .expect_err("ret_code is non-zero");
        assert!(!err.is_business());
        assert!(err.is_retryable());
        assert!(err.to_string().contains("5100"), "{err}");
    }

    #[rstest]
    #[case(503, "server busy, please try later", true)]
    #[case(401, "signature mismatch", false)]
    fn http_errors_are_transport_failures(
        #[case] status: u16,
        #[case] body: &str,
        #[case] retryable: bool,
    ) {
        let err = parse_reply::<Acknowledged>(StoreAction::DeleteVolumes, status, body)
            .expect_err("non-2xx");
        assert!(!err.is_business());
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn undecodable_body_is_a_transport_failure() {
        let err = parse_reply::<CreateVolumesReply>(StoreAction::CreateVolumes, 200, "<html>")
            .expect_err("not JSON");
        assert!(matches!(err, StoreError::Transport { .. }));
    }

    #[test]
    fn unknown_volume_status_is_rejected() {
        let volume = WireVolume {
            volume_id: String::from("vol-1"),
            volume_name: String::new(),
            size: 10,
            volume_type: 0,
            status: String::from("exploding"),
            instance: None,
        };
        assert!(volume.into_volume(StoreAction::DescribeVolumes).is_err());
    }

    #[test]
    fn name_query_lists_live_statuses_and_pages() {
        let params = describe_volumes_params(
            &VolumeQuery::ByName {
                name: String::from("pvc-1"),
                statuses: VolumeStatus::LIVE.to_vec(),
            },
            200,
        );
        assert_eq!(
            params.first(),
            Some(&(String::from("search_word"), String::from("pvc-1")))
        );
        assert!(params.contains(&(String::from("limit"), String::from("100"))));
        assert!(params.contains(&(String::from("offset"), String::from("200"))));
        assert!(params.contains(&(String::from("status.3"), String::from("in-use"))));
        assert_eq!(params.len(), 7);
    }

    #[test]
    fn id_query_ignores_offset() {
        let params = describe_volumes_params(&VolumeQuery::ById(String::from("vol-1")), 0);
        assert_eq!(
            params,
            vec![(String::from("volumes.1"), String::from("vol-1"))]
        );
    }

    #[test]
    fn attachment_params_index_volumes() {
        let params = attachment_params(&[String::from("vol-1")], "i-node1");
        assert_eq!(
            params,
            vec![
                (String::from("volumes.1"), String::from("vol-1")),
                (String::from("instance"), String::from("i-node1")),
            ]
        );
    }

    #[test]
    fn terminated_instances_are_not_live() {
        let body = r#"{"ret_code": 0, "instance_set": [{"instance_id": "i-1", "status": "terminated"}]}"#;
        let reply: DescribeInstancesReply =
            parse_reply(StoreAction::DescribeInstances, 200, body).expect("valid reply");
        assert!(!reply.is_live("i-1"));
    }
}
