use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use uuid::Uuid;

/// 对象存储网关客户端。
/// 只暴露核心需要的窄接口: 上传、删除、生成 key、从 URL 还原 key。
#[derive(Clone)]
pub struct StorageService {
    client: Client,
    config: StorageConfig,
}

impl StorageService {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// 上传文件并返回对外可访问的 URL
    pub async fn upload(&self, bytes: Vec<u8>, key: &str, content_type: &str) -> AppResult<String> {
        let url = format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            key
        );

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.access_token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("Storage upload failed: {key}, status {status}, body {body}");
            return Err(AppError::ExternalApiError(format!(
                "Failed to upload file: {status}"
            )));
        }

        Ok(self.public_url(key))
    }

    /// 删除对象。孤儿缩略图清理走 best-effort 路径，调用方只记录日志
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let url = format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            key
        );

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Failed to delete object {key}: {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// 生成对象 key: {folder}/{owner}/{label}-{uuid}.{ext}
    pub fn generate_key(&self, folder: &str, owner: &str, original_name: &str, label: &str) -> String {
        let ext = original_name
            .rsplit('.')
            .next()
            .filter(|e| !e.is_empty() && e.len() <= 8)
            .unwrap_or("bin")
            .to_ascii_lowercase();

        format!(
            "{}/{}/{}-{}.{}",
            folder.trim_matches('/'),
            owner,
            label,
            Uuid::new_v4(),
            ext
        )
    }

    /// 从对外 URL 还原对象 key (删除旧缩略图时使用)
    pub fn extract_key_from_url(&self, url: &str) -> AppResult<String> {
        let prefix = format!("{}/", self.config.public_url.trim_end_matches('/'));
        url.strip_prefix(&prefix)
            .map(|k| k.to_string())
            .ok_or_else(|| {
                AppError::ValidationError(format!("URL does not belong to this storage: {url}"))
            })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.config.public_url.trim_end_matches('/'), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> StorageService {
        StorageService::new(StorageConfig {
            base_url: "https://storage.internal".to_string(),
            bucket: "plotpicks".to_string(),
            access_token: "token".to_string(),
            public_url: "https://cdn.example.com".to_string(),
        })
    }

    #[test]
    fn test_generate_key_shape() {
        let service = test_service();
        let key = service.generate_key("admin/shows", "show", "poster.PNG", "show-7");

        assert!(key.starts_with("admin/shows/show/show-7-"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn test_generate_key_without_extension() {
        let service = test_service();
        let key = service.generate_key("admin/shows", "show", "poster", "show-7");
        assert!(key.ends_with(".bin"));
    }

    #[test]
    fn test_extract_key_from_url() {
        let service = test_service();
        let key = service
            .extract_key_from_url("https://cdn.example.com/admin/shows/show/a-b.png")
            .unwrap();
        assert_eq!(key, "admin/shows/show/a-b.png");
    }

    #[test]
    fn test_extract_key_rejects_foreign_url() {
        let service = test_service();
        assert!(
            service
                .extract_key_from_url("https://elsewhere.com/file.png")
                .is_err()
        );
    }
}
