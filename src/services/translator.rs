//! 翻译服务客户端
//!
//! 调用外部翻译接口 `GET <endpoint>?text=<原文>`，接口返回
//! `{"translated_text": "<译文>"}`。单次请求有超时，网络错误、超时和
//! 5xx/429 响应会按指数退避重试有限次数。

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::TranslatorConfig;

/// 翻译失败原因
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("翻译请求失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("翻译接口返回异常状态码: {status}, body: {body}")]
    Status { status: StatusCode, body: String },

    #[error("翻译结果解析失败: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("翻译结果缺少 translated_text 字段")]
    MissingField,

    #[error("翻译结果为空")]
    Empty,
}

impl TranslateError {
    /// 是否值得重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Request(_) => true,
            TranslateError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// 单次重试等待的上限
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// 第 `attempt` 次重试前的等待时间，按 2 的幂增长并封顶
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt))
        .unwrap_or(MAX_RETRY_BACKOFF)
        .min(MAX_RETRY_BACKOFF)
}

/// 文本翻译能力
pub trait Translator: Send + Sync + 'static {
    fn translate(&self, text: &str)
        -> impl Future<Output = Result<String, TranslateError>> + Send;
}

#[derive(Deserialize)]
struct TranslationResponse {
    translated_text: Option<String>,
}

/// 基于 HTTP 的翻译客户端
#[derive(Clone)]
pub struct HttpTranslator {
    client: Client,
    config: TranslatorConfig,
}

impl HttpTranslator {
    pub fn new(config: TranslatorConfig) -> Result<Self, TranslateError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    async fn request_once(&self, text: &str) -> Result<String, TranslateError> {
        let mut url = self.config.endpoint.clone();
        url.query_pairs_mut().append_pair("text", text);

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status != StatusCode::OK {
            return Err(TranslateError::Status { status, body });
        }

        let parsed: TranslationResponse = serde_json::from_str(&body)?;
        let translated = parsed.translated_text.ok_or(TranslateError::MissingField)?;
        let translated = translated.trim();
        if translated.is_empty() {
            return Err(TranslateError::Empty);
        }

        Ok(translated.to_string())
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, text: &str)
        -> impl Future<Output = Result<String, TranslateError>> + Send {
        async move {
            let mut attempt = 0u32;
            loop {
                match self.request_once(text).await {
                    Ok(translated) => {
                        debug!("翻译成功: {} -> {}", text, translated);
                        return Ok(translated);
                    }
                    Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                        let backoff = retry_delay(self.config.retry_backoff, attempt);
                        attempt += 1;
                        warn!(
                            "翻译请求失败，{:?} 后进行第 {} 次重试: {}",
                            backoff, attempt, e
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}
