//! # 下载模块
//!
//! ## 设计思路
//!
//! 通过 `ImageFetcher` trait 抽象“按地址取回字节”的能力，编排层只依赖 trait，
//! 测试可注入内存实现，生产环境使用基于 `reqwest` 的 `HttpFetcher`。
//!
//! ## 实现思路
//!
//! - HTTP/HTTPS：状态码 + 体积校验 + 流式读取（首包/分块超时）。
//! - `data:image/...;base64,`：本地解码，不发网络请求。
//! - 每读取一个分块都会检查取消令牌。
//! - 日志与错误信息中的 URL 统一去掉 query/fragment。

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use tokio_util::sync::CancellationToken;

use super::source::{CopyStage, RawImageBytes};
use super::{CopierConfig, ImageCopyError};

const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;
const DATA_URL_BASE64_MARKER: &str = ";base64,";

/// 按地址取回图片字节的能力。
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// 下载 `url` 指向的完整内容。
    ///
    /// 失败统一返回 `Fetch`；读取超时返回 `Timeout`，取消返回 `Cancelled`。
    async fn fetch(
        &self,
        url: &str,
        config: &CopierConfig,
        cancel: &CancellationToken,
    ) -> Result<RawImageBytes, ImageCopyError>;
}

/// 基于 `reqwest` 的下载实现。
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }

    fn build_client(config: &CopierConfig) -> Result<reqwest::Client, ImageCopyError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| ImageCopyError::Fetch(format!("无法创建 HTTP 客户端：{}", e)))
    }

    async fn download(
        &self,
        url: reqwest::Url,
        config: &CopierConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ImageCopyError> {
        let client = Self::build_client(config)?;
        let request = client.get(url.clone()).header(
            reqwest::header::ACCEPT,
            "image/avif,image/webp,image/apng,image/png,image/jpeg,image/*,*/*;q=0.8",
        );

        log::debug!("📡 发送 HTTP 请求...");
        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ImageCopyError::Cancelled { stage: CopyStage::Fetching });
            }
            sent = request.send() => {
                sent.map_err(|e| Self::map_reqwest_error(e, url.as_str(), config))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ImageCopyError::Fetch(format!(
                "HTTP {}: {}",
                status.as_u16(),
                Self::status_message(status.as_u16())
            )));
        }

        if let Some(ct) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            if let Ok(ct_str) = ct.to_str() {
                if !Self::is_image_content_type(ct_str) {
                    log::warn!("⚠️ 响应 Content-Type 不是图片：{}，继续按声明格式处理", ct_str);
                }
            }
        }

        let total_len = response.content_length();
        if let Some(size) = total_len {
            if size > config.max_file_size {
                return Err(Self::too_large(size, config.max_file_size));
            }
        }

        let initial_capacity = total_len
            .map(|len| len.min(config.max_file_size).min(usize::MAX as u64) as usize)
            .filter(|len| *len > 0)
            .unwrap_or(BUFFER_INITIAL_CAPACITY);
        let mut buffer = Vec::with_capacity(initial_capacity);
        let mut received_first_chunk = false;

        loop {
            let read_timeout_ms = if received_first_chunk {
                config.stream_chunk_timeout_ms
            } else {
                config.stream_first_byte_timeout_ms
            };

            let next_chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ImageCopyError::Cancelled { stage: CopyStage::Fetching });
                }
                chunk = tokio::time::timeout(Duration::from_millis(read_timeout_ms), response.chunk()) => {
                    chunk.map_err(|_| ImageCopyError::Timeout {
                        stage: CopyStage::Fetching,
                        timeout_ms: read_timeout_ms,
                    })?
                }
            };

            let Some(chunk) = next_chunk.map_err(|e| Self::map_reqwest_error(e, url.as_str(), config))?
            else {
                break;
            };

            received_first_chunk = true;
            let total = buffer.len() as u64 + chunk.len() as u64;
            if total > config.max_file_size {
                return Err(Self::too_large(total, config.max_file_size));
            }
            buffer.extend_from_slice(&chunk);
        }

        log::debug!("✅ 下载完成 - {} bytes", buffer.len());
        Ok(buffer)
    }

    /// 解析 `data:image/<type>;base64,<payload>`。
    fn decode_data_url(url: &str, max_file_size: u64) -> Result<Vec<u8>, ImageCopyError> {
        if !url.starts_with("data:image/") {
            return Err(ImageCopyError::Fetch("data URL 不是图片类型".to_string()));
        }

        let marker = url
            .find(DATA_URL_BASE64_MARKER)
            .ok_or_else(|| ImageCopyError::Fetch("data URL 缺少 base64 标记".to_string()))?;
        let payload = &url[marker + DATA_URL_BASE64_MARKER.len()..];

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(payload);
        if estimated_len > max_file_size {
            return Err(Self::too_large(estimated_len, max_file_size));
        }

        general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ImageCopyError::Fetch(format!("Base64 解码失败：{}", e)))
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> u64 {
        let len = base64_data.trim().len() as u64;
        len.saturating_add(3) / 4 * 3
    }

    fn too_large(size: u64, limit: u64) -> ImageCopyError {
        ImageCopyError::Fetch(format!(
            "文件过大：{:.2} MB（限制：{:.2} MB）",
            size as f64 / 1024.0 / 1024.0,
            limit as f64 / 1024.0 / 1024.0
        ))
    }

    /// 统一映射 reqwest 错误到业务错误。
    fn map_reqwest_error(e: reqwest::Error, url: &str, config: &CopierConfig) -> ImageCopyError {
        let err_msg = Self::sanitize_error_message_with_redacted_url(&e.to_string(), url);

        if e.is_timeout() {
            ImageCopyError::Timeout {
                stage: CopyStage::Fetching,
                timeout_ms: config.download_timeout.saturating_mul(1000),
            }
        } else if e.is_connect() {
            ImageCopyError::Fetch(format!("无法连接：{}", err_msg))
        } else if e.is_redirect() {
            ImageCopyError::Fetch(format!("重定向次数超过限制（{}）", config.max_redirects))
        } else {
            ImageCopyError::Fetch(format!("请求失败：{}", err_msg))
        }
    }

    fn sanitize_error_message_with_redacted_url(error_msg: &str, url: &str) -> String {
        let redacted = redact_url_for_log(url);
        error_msg.replace(url, &redacted)
    }

    fn is_image_content_type(content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .map(|base| base.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }

    fn status_message(code: u16) -> &'static str {
        match code {
            404 => "未找到",
            401 | 403 => "访问被拒绝",
            500..=599 => "服务器错误",
            _ => "请求失败",
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        config: &CopierConfig,
        cancel: &CancellationToken,
    ) -> Result<RawImageBytes, ImageCopyError> {
        let url = url.trim();

        if url.starts_with("data:") {
            if !config.allow_data_urls {
                return Err(ImageCopyError::Fetch("已禁用 data URL".to_string()));
            }
            log::info!("📝 解析 data URL 图片");
            let bytes = Self::decode_data_url(url, config.max_file_size)?;
            return Ok(RawImageBytes::new(bytes, "data-url"));
        }

        let parsed = reqwest::Url::parse(url)
            .map_err(|e| ImageCopyError::Fetch(format!("URL 格式错误：{}", e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ImageCopyError::Fetch(format!(
                "不支持的协议：{}（仅支持 HTTP/HTTPS/data）",
                parsed.scheme()
            )));
        }

        log::info!("🌐 开始下载图片 - URL: {}", redact_url_for_log(url));
        let bytes = self.download(parsed, config, cancel).await?;
        if bytes.is_empty() {
            return Err(ImageCopyError::Fetch("响应内容为空".to_string()));
        }

        Ok(RawImageBytes::new(bytes, "http"))
    }
}

/// 去掉 query 与 fragment，避免把令牌等敏感参数写进日志。
pub(crate) fn redact_url_for_log(url: &str) -> String {
    if url.starts_with("data:") {
        return "<data-url>".to_string();
    }

    let Ok(parsed) = reqwest::Url::parse(url) else {
        return "<invalid-url>".to_string();
    };

    let host = parsed.host_str().unwrap_or("<unknown-host>");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let path = parsed.path();

    format!("{}://{}{}{}", parsed.scheme(), host, port, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener};
    use std::thread::{self, JoinHandle};

    fn serve_once(head: String, body: Vec<u8>) -> (SocketAddr, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let addr = listener.local_addr().expect("read local addr failed");

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept failed");

            let mut req_buf = [0u8; 1024];
            let _ = stream.read(&mut req_buf);

            stream.write_all(head.as_bytes()).expect("write headers failed");
            stream.write_all(&body).expect("write body failed");
            stream.flush().expect("flush failed");
        });

        (addr, server)
    }

    #[tokio::test]
    async fn fetch_returns_body_bytes() {
        let body = vec![137_u8, 80, 78, 71, 13, 10, 26, 10, 1, 2, 3, 4];
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let (addr, server) = serve_once(head, body.clone());

        let url = format!("http://127.0.0.1:{}/icon.png", addr.port());
        let raw = HttpFetcher::new()
            .fetch(&url, &CopierConfig::default(), &CancellationToken::new())
            .await
            .expect("fetch should succeed");

        server.join().expect("server thread failed");

        assert_eq!(raw.bytes().as_ref(), body.as_slice());
        assert_eq!(raw.source_hint(), "http");
        assert_eq!(raw.sniffed_mime(), Some("image/png"));
    }

    #[tokio::test]
    async fn fetch_maps_not_found_to_fetch_error() {
        let head =
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
        let (addr, server) = serve_once(head, Vec::new());

        let url = format!("http://127.0.0.1:{}/missing.png", addr.port());
        let result = HttpFetcher::new()
            .fetch(&url, &CopierConfig::default(), &CancellationToken::new())
            .await;

        server.join().expect("server thread failed");

        match result {
            Err(ImageCopyError::Fetch(message)) => assert!(message.contains("404")),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_rejects_oversized_content_length() {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 4096\r\nConnection: close\r\n\r\n"
            .to_string();
        let (addr, server) = serve_once(head, Vec::new());

        let config = CopierConfig {
            max_file_size: 1024,
            ..CopierConfig::default()
        };
        let url = format!("http://127.0.0.1:{}/big.png", addr.port());
        let result = HttpFetcher::new()
            .fetch(&url, &config, &CancellationToken::new())
            .await;

        server.join().expect("server thread failed");

        assert!(matches!(result, Err(ImageCopyError::Fetch(_))));
    }

    #[tokio::test]
    async fn fetch_maps_server_error_to_fetch_error() {
        let head = "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string();
        let (addr, server) = serve_once(head, Vec::new());

        let url = format!("http://127.0.0.1:{}/busy.png", addr.port());
        let result = HttpFetcher::new()
            .fetch(&url, &CopierConfig::default(), &CancellationToken::new())
            .await;

        server.join().expect("server thread failed");

        match result {
            Err(ImageCopyError::Fetch(message)) => {
                assert!(message.contains("503"));
                assert!(message.contains("服务器错误"));
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_maps_refused_connection_to_fetch_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
            listener.local_addr().expect("read local addr failed").port()
        };

        let url = format!("http://127.0.0.1:{}/a.png?token=secret", port);
        let result = HttpFetcher::new()
            .fetch(&url, &CopierConfig::default(), &CancellationToken::new())
            .await;

        match result {
            Err(ImageCopyError::Fetch(message)) => assert!(!message.contains("secret")),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_bounds_streamed_body_without_content_length() {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nConnection: close\r\n\r\n".to_string();
        let (addr, server) = serve_once(head, vec![0_u8; 4096]);

        let config = CopierConfig {
            max_file_size: 1024,
            ..CopierConfig::default()
        };
        let url = format!("http://127.0.0.1:{}/stream.png", addr.port());
        let result = HttpFetcher::new()
            .fetch(&url, &config, &CancellationToken::new())
            .await;

        server.join().expect("server thread failed");

        match result {
            Err(ImageCopyError::Fetch(message)) => assert!(message.contains("文件过大")),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_rejects_empty_body() {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string();
        let (addr, server) = serve_once(head, Vec::new());

        let url = format!("http://127.0.0.1:{}/empty.png", addr.port());
        let result = HttpFetcher::new()
            .fetch(&url, &CopierConfig::default(), &CancellationToken::new())
            .await;

        server.join().expect("server thread failed");

        assert_eq!(result.map(|raw| raw.len()), Err(ImageCopyError::Fetch("响应内容为空".to_string())));
    }

    #[tokio::test]
    async fn fetch_honours_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();

        // 端口 9 (discard) 通常无人监听；取消分支优先，不会真正等待连接结果。
        let result = HttpFetcher::new()
            .fetch("http://127.0.0.1:9/a.png", &CopierConfig::default(), &token)
            .await;

        assert!(matches!(
            result,
            Err(ImageCopyError::Cancelled { stage: CopyStage::Fetching })
        ));
    }

    #[tokio::test]
    async fn fetch_rejects_unsupported_scheme() {
        let result = HttpFetcher::new()
            .fetch("ftp://host/a.png", &CopierConfig::default(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ImageCopyError::Fetch(_))));
    }

    #[tokio::test]
    async fn fetch_decodes_data_url_without_network() {
        let png_signature = [137_u8, 80, 78, 71, 13, 10, 26, 10];
        let url = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png_signature)
        );

        let raw = HttpFetcher::new()
            .fetch(&url, &CopierConfig::default(), &CancellationToken::new())
            .await
            .expect("data url should decode");

        assert_eq!(raw.bytes().as_ref(), &png_signature);
        assert_eq!(raw.source_hint(), "data-url");
    }

    #[tokio::test]
    async fn fetch_refuses_data_url_when_disabled() {
        let config = CopierConfig {
            allow_data_urls: false,
            ..CopierConfig::default()
        };

        let result = HttpFetcher::new()
            .fetch("data:image/png;base64,AAAA", &config, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ImageCopyError::Fetch(_))));
    }

    #[test]
    fn data_url_size_is_checked_before_decode() {
        let huge = format!("data:image/png;base64,{}", "A".repeat(1024 * 1024));
        let result = HttpFetcher::decode_data_url(&huge, 32);

        assert!(matches!(result, Err(ImageCopyError::Fetch(_))));
    }

    #[test]
    fn content_type_parser_accepts_image_with_params() {
        assert!(HttpFetcher::is_image_content_type("image/png; charset=utf-8"));
        assert!(HttpFetcher::is_image_content_type("IMAGE/JPEG"));
        assert!(!HttpFetcher::is_image_content_type("text/html; charset=utf-8"));
    }

    #[test]
    fn redact_url_for_log_removes_query_and_fragment() {
        let redacted = redact_url_for_log("https://example.com:8443/path/img.png?token=abc123#hash");

        assert_eq!(redacted, "https://example.com:8443/path/img.png");
        assert_eq!(redact_url_for_log("data:image/png;base64,AAAA"), "<data-url>");
    }
}
