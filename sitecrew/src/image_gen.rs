//! Image generation: a ComfyUI client and a deterministic placeholder
//! renderer used whenever the service is missing or fails.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::error::BackendError;

const DEFAULT_CHECKPOINT: &str = "sd_xl_base_1.0.safetensors";
const NEGATIVE_PROMPT: &str = "low quality, blurry, distorted, ugly, bad anatomy";
/// Workflow node whose output holds the saved image.
const SAVE_NODE: &str = "9";

/// Anything that can render `prompt` into an image file at `dest`.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, prompt: &str, style: &str, dest: &Path) -> Result<(), BackendError>;
}

fn full_prompt(prompt: &str, style: &str) -> String {
    if style.is_empty() {
        prompt.to_string()
    } else {
        format!("{prompt}, {style}")
    }
}

/// ComfyUI HTTP client (`/prompt`, `/history`, `/view`).
pub struct ComfyUi {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
    poll_interval: Duration,
    width: u32,
    height: u32,
    steps: u32,
}

impl ComfyUi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            timeout: Duration::from_secs(180),
            poll_interval: Duration::from_secs(1),
            width: 800,
            height: 600,
            steps: 25,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Probe `GET /`.
    pub async fn is_available(&self) -> bool {
        match self
            .http
            .get(format!("{}/", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "ComfyUI probe failed");
                false
            }
        }
    }

    /// First installed checkpoint, or the SDXL base model.
    async fn checkpoint(&self) -> String {
        let url = format!("{}/object_info/CheckpointLoaderSimple", self.base_url);
        let info: Option<Value> = match self.http.get(url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) if resp.status().is_success() => resp.json().await.ok(),
            _ => None,
        };
        let name = info.as_ref().and_then(|info| {
            let node = info.get("CheckpointLoaderSimple").unwrap_or(info);
            node.pointer("/input/required/ckpt_name/0/0")
                .and_then(Value::as_str)
                .map(String::from)
        });
        name.unwrap_or_else(|| DEFAULT_CHECKPOINT.to_string())
    }

    fn workflow(&self, prompt: &str, checkpoint: &str, seed: u64) -> Value {
        json!({
            "3": {
                "class_type": "KSampler",
                "inputs": {
                    "seed": seed,
                    "steps": self.steps,
                    "cfg": 7.0,
                    "sampler_name": "dpmpp_sde_gpu",
                    "scheduler": "normal",
                    "denoise": 1.0,
                    "model": ["4", 0],
                    "positive": ["6", 0],
                    "negative": ["7", 0],
                    "latent_image": ["5", 0],
                },
            },
            "4": {
                "class_type": "CheckpointLoaderSimple",
                "inputs": { "ckpt_name": checkpoint },
            },
            "5": {
                "class_type": "EmptyLatentImage",
                "inputs": { "width": self.width, "height": self.height, "batch_size": 1 },
            },
            "6": {
                "class_type": "CLIPTextEncode",
                "inputs": { "text": prompt, "clip": ["4", 1] },
            },
            "7": {
                "class_type": "CLIPTextEncode",
                "inputs": { "text": NEGATIVE_PROMPT, "clip": ["4", 1] },
            },
            "8": {
                "class_type": "VAEDecode",
                "inputs": { "samples": ["3", 0], "vae": ["4", 2] },
            },
            SAVE_NODE: {
                "class_type": "SaveImage",
                "inputs": { "filename_prefix": "ComfyUI", "images": ["8", 0] },
            },
        })
    }

    async fn submit(&self, workflow: Value) -> Result<String, BackendError> {
        let resp = self
            .http
            .post(format!("{}/prompt", self.base_url))
            .json(&json!({ "prompt": workflow }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp.json().await?;
        body.get("prompt_id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| BackendError::Malformed("no prompt_id in response".into()))
    }

    /// Poll history until the save node reports a file name.
    async fn wait_for_output(&self, prompt_id: &str) -> Result<String, BackendError> {
        let url = format!("{}/history/{prompt_id}", self.base_url);
        let pointer = format!("/{prompt_id}/outputs/{SAVE_NODE}/images/0/filename");
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let resp = match self.http.get(&url).send().await {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    tracing::debug!(status = %r.status(), "ComfyUI history not ready");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let history: Value = resp.json().await?;
            if let Some(name) = history.pointer(&pointer).and_then(Value::as_str) {
                return Ok(name.to_string());
            }
        }
    }

    async fn download(&self, filename: &str, dest: &Path) -> Result<(), BackendError> {
        let resp = self
            .http
            .get(format!("{}/view", self.base_url))
            .query(&[("filename", filename)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BackendError::Status {
                status: resp.status().as_u16(),
                body: String::new(),
            });
        }
        let bytes = resp.bytes().await?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| BackendError::Unavailable(format!("writing {}: {e}", dest.display())))
    }

    async fn run(&self, prompt: &str, dest: &Path) -> Result<(), BackendError> {
        let checkpoint = self.checkpoint().await;
        let seed = rand::thread_rng().gen_range(1..=1_000_000u64);
        tracing::info!(%checkpoint, seed, "Submitting ComfyUI workflow");
        let prompt_id = self.submit(self.workflow(prompt, &checkpoint, seed)).await?;
        let filename = self.wait_for_output(&prompt_id).await?;
        self.download(&filename, dest).await
    }
}

#[async_trait]
impl ImageBackend for ComfyUi {
    async fn generate(&self, prompt: &str, style: &str, dest: &Path) -> Result<(), BackendError> {
        let prompt = full_prompt(prompt, style);
        tokio::time::timeout(self.timeout, self.run(&prompt, dest))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))?
    }
}

/// Render a placeholder: a light vertical gradient tinted by a hash of the
/// prompt, framed by a grey border. JPEG for `.jpg`/`.jpeg`, PNG otherwise.
pub fn write_placeholder(
    prompt: &str,
    style: &str,
    dest: &Path,
    width: u32,
    height: u32,
) -> Result<(), image::ImageError> {
    let digest = Sha256::digest(format!("{prompt}\n{style}").as_bytes());
    let tint = [digest[0] / 8, digest[1] / 8, digest[2] / 8];
    let (w, h) = (width.max(1), height.max(1));

    let img = image::RgbImage::from_fn(w, h, |x, y| {
        let on_border = (10..12).contains(&x.min(w - 1 - x)) || (10..12).contains(&y.min(h - 1 - y));
        if on_border {
            return image::Rgb([204, 204, 204]);
        }
        let base = 240 - (y as u64 * 40 / h as u64) as u8;
        image::Rgb([
            base.saturating_sub(tint[0]),
            base.saturating_add(10).saturating_sub(tint[1]),
            base.saturating_add(15).saturating_sub(tint[2]),
        ])
    });

    let format = match image::ImageFormat::from_path(dest) {
        Ok(image::ImageFormat::Jpeg) => image::ImageFormat::Jpeg,
        _ => image::ImageFormat::Png,
    };
    img.save_with_format(dest, format)
}

/// Result of one image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Generated,
    /// The backend failed or is disabled; a placeholder was written.
    Placeholder { reason: String },
    /// Nothing usable was written.
    Failed { reason: String },
}

impl ImageOutcome {
    /// True if a file now exists at the destination.
    pub fn wrote_file(&self) -> bool {
        !matches!(self, ImageOutcome::Failed { .. })
    }
}

/// Front for the executor: tries the backend, then the placeholder.
pub struct ImageGenerator {
    backend: Option<Box<dyn ImageBackend>>,
    width: u32,
    height: u32,
}

impl ImageGenerator {
    pub fn new(backend: Option<Box<dyn ImageBackend>>) -> Self {
        Self {
            backend,
            width: 800,
            height: 600,
        }
    }

    /// Placeholders only.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn generate(&self, prompt: &str, style: &str, dest: &Path) -> ImageOutcome {
        if let Some(parent) = dest.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return ImageOutcome::Failed {
                reason: format!("creating {}: {e}", parent.display()),
            };
        }

        let reason = match &self.backend {
            Some(backend) => match backend.generate(prompt, style, dest).await {
                Ok(()) => {
                    tracing::info!(dest = %dest.display(), "Image generated");
                    return ImageOutcome::Generated;
                }
                Err(e) => {
                    tracing::warn!(dest = %dest.display(), error = %e, "Image backend failed");
                    e.to_string()
                }
            },
            None => "image backend disabled".to_string(),
        };

        let (prompt, style, path) = (prompt.to_string(), style.to_string(), PathBuf::from(dest));
        let (w, h) = (self.width, self.height);
        let written =
            tokio::task::spawn_blocking(move || write_placeholder(&prompt, &style, &path, w, h)).await;
        match written {
            Ok(Ok(())) => ImageOutcome::Placeholder { reason },
            Ok(Err(e)) => ImageOutcome::Failed {
                reason: format!("{reason}; placeholder failed: {e}"),
            },
            Err(e) => ImageOutcome::Failed {
                reason: format!("{reason}; placeholder task failed: {e}"),
            },
        }
    }
}
