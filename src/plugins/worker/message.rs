use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::oneshot;

/// 页面发给 worker 的消息（JSON 形式）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    SkipWaiting,
    GetCacheInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageReply {
    /// 缓存桶名称 -> 条目数
    CacheInfo(BTreeMap<String, usize>),
    Ack { ok: bool },
}

/// 通过 channel 投递的消息，附带一次性回复通道
#[derive(Debug)]
pub struct Envelope {
    pub message: ClientMessage,
    pub reply: Option<oneshot::Sender<MessageReply>>,
}

impl Envelope {
    pub fn new(message: ClientMessage) -> (Self, oneshot::Receiver<MessageReply>) {
        let (tx, rx) = oneshot::channel();
        (Self { message, reply: Some(tx) }, rx)
    }

    /// 不需要回复的消息
    pub fn fire_and_forget(message: ClientMessage) -> Self {
        Self { message, reply: None }
    }
}
