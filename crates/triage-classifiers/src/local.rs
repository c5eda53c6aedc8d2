//! In-process sequence classifier on Candle
//!
//! Loads a BERT or DistilBERT sequence-classification checkpoint
//! (`config.json`, `tokenizer.json`, `model.safetensors`) from a local
//! directory or the HuggingFace hub. Inference is tokenize, truncate,
//! forward pass, softmax, arg-max.

use crate::classifier::{ClassificationMetadata, ClassificationResult, Classifier};
use crate::config::LocalModelConfig;
use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::{Tokenizer, TruncationParams};
use triage_core::{DepartmentTable, Error, Result};

const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Classifier running a local sequence-classification model
pub struct LocalModelClassifier {
    inner: Arc<LocalModel>,
}

struct LocalModel {
    name: String,
    tokenizer: Tokenizer,
    model: SequenceModel,
    device: Device,
    labels: Vec<String>,
    departments: DepartmentTable,
}

enum SequenceModel {
    Bert {
        backbone: BertModel,
        pooler: Option<Linear>,
        head: Linear,
    },
    DistilBert {
        backbone: DistilBertModel,
        pre_classifier: Option<Linear>,
        head: Linear,
    },
}

impl LocalModelClassifier {
    /// Load the model described by `config`. Blocking: downloads and mmaps weights.
    pub fn load(
        config: &LocalModelConfig,
        token: Option<&str>,
        departments: DepartmentTable,
    ) -> Result<Self> {
        let (model_dir, name) = match &config.path {
            Some(path) => (path.clone(), path.display().to_string()),
            None => (
                download_from_hub(&config.repo, &config.revision, token)?,
                config.repo.clone(),
            ),
        };

        let config_json = read_config(&model_dir)?;
        let labels = labels_from_config(&config_json)?;
        let hidden_size = hidden_size_from_config(&config_json);

        let mut tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| Error::classifier(format!("Failed to load tokenizer.json: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::classifier(format!("Failed to configure truncation: {}", e)))?;
        tokenizer.with_padding(None);

        let device = get_device(&config.device)?;
        let vb = load_var_builder(&model_dir, &device)?;

        let model_type = config_json
            .get("model_type")
            .and_then(Value::as_str)
            .unwrap_or("bert");

        let model = match model_type {
            "distilbert" => {
                let distil_config: DistilBertConfig = serde_json::from_value(config_json.clone())?;
                let backbone = DistilBertModel::load(vb.pp("distilbert"), &distil_config)
                    .map_err(ml_err("Failed to load DistilBERT model"))?;
                let pre_classifier =
                    candle_nn::linear(hidden_size, hidden_size, vb.pp("pre_classifier")).ok();
                let head = candle_nn::linear(hidden_size, labels.len(), vb.pp("classifier"))
                    .map_err(ml_err("Failed to load classification head"))?;
                SequenceModel::DistilBert {
                    backbone,
                    pre_classifier,
                    head,
                }
            }
            "bert" => {
                let bert_config: BertConfig = serde_json::from_value(config_json.clone())?;
                let backbone = BertModel::load(vb.pp("bert"), &bert_config)
                    .map_err(ml_err("Failed to load BERT model"))?;
                let pooler = candle_nn::linear(
                    bert_config.hidden_size,
                    bert_config.hidden_size,
                    vb.pp("bert").pp("pooler").pp("dense"),
                )
                .ok();
                let head = candle_nn::linear(bert_config.hidden_size, labels.len(), vb.pp("classifier"))
                    .map_err(ml_err("Failed to load classification head"))?;
                SequenceModel::Bert {
                    backbone,
                    pooler,
                    head,
                }
            }
            other => {
                return Err(Error::config(format!(
                    "Unsupported model_type '{}' (expected bert or distilbert)",
                    other
                )))
            }
        };

        tracing::info!(
            model = %name,
            model_type,
            num_labels = labels.len(),
            "Loaded sequence classifier"
        );

        Ok(Self {
            inner: Arc::new(LocalModel {
                name,
                tokenizer,
                model,
                device,
                labels,
                departments,
            }),
        })
    }
}

#[async_trait]
impl Classifier for LocalModelClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || inner.predict(&text))
            .await
            .map_err(|e| Error::internal(format!("Inference task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        &self.inner.name
    }
}

impl LocalModel {
    fn predict(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::classifier(format!("Tokenization failed: {}", e)))?;

        let logits = match &self.model {
            SequenceModel::Bert {
                backbone,
                pooler,
                head,
            } => {
                let input_ids = Tensor::new(encoding.get_ids(), &self.device)
                    .and_then(|t| t.unsqueeze(0))
                    .map_err(ml_err("Failed to create input tensor"))?;
                let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)
                    .and_then(|t| t.unsqueeze(0))
                    .map_err(ml_err("Failed to create token type tensor"))?;

                let hidden_states = backbone
                    .forward(&input_ids, &token_type_ids, None)
                    .map_err(ml_err("Model forward pass failed"))?;
                let cls = cls_embedding(&hidden_states)?;
                let pooled = match pooler {
                    Some(dense) => dense
                        .forward(&cls)
                        .and_then(|t| t.tanh())
                        .map_err(ml_err("Pooler failed"))?,
                    None => cls,
                };
                head.forward(&pooled)
                    .map_err(ml_err("Classification head failed"))?
            }
            SequenceModel::DistilBert {
                backbone,
                pre_classifier,
                head,
            } => {
                let ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
                let input_ids = Tensor::new(ids.as_slice(), &self.device)
                    .and_then(|t| t.unsqueeze(0))
                    .map_err(ml_err("Failed to create input tensor"))?;
                // DistilBERT expects the mask inverted: 1 marks positions to ignore
                let mask: Vec<u8> = encoding
                    .get_attention_mask()
                    .iter()
                    .map(|&x| u8::from(x == 0))
                    .collect();
                let attention_mask = Tensor::new(mask.as_slice(), &self.device)
                    .and_then(|t| t.unsqueeze(0))
                    .map_err(ml_err("Failed to create attention mask"))?;

                let hidden_states = backbone
                    .forward(&input_ids, &attention_mask)
                    .map_err(ml_err("Model forward pass failed"))?;
                let cls = cls_embedding(&hidden_states)?;
                let pooled = match pre_classifier {
                    Some(dense) => dense
                        .forward(&cls)
                        .and_then(|t| t.relu())
                        .map_err(ml_err("Pre-classifier failed"))?,
                    None => cls,
                };
                head.forward(&pooled)
                    .map_err(ml_err("Classification head failed"))?
            }
        };

        let probs = candle_nn::ops::softmax(&logits, D::Minus1)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(ml_err("Softmax failed"))?;

        let (index, score) =
            top_class(&probs).ok_or_else(|| Error::classifier("Model produced no logits"))?;

        let raw_label = self
            .labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("LABEL_{}", index));

        let mut all_scores: Vec<(String, f32)> = self
            .labels
            .iter()
            .zip(probs.iter())
            .map(|(label, p)| (self.departments.resolve(label), *p))
            .collect();
        all_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(ClassificationResult {
            label: self.departments.resolve(&raw_label),
            score,
            metadata: ClassificationMetadata {
                model: Some(self.name.clone()),
                all_scores: Some(all_scores),
            },
            latency_us: start.elapsed().as_micros() as u64,
        })
    }
}

fn cls_embedding(hidden_states: &Tensor) -> Result<Tensor> {
    hidden_states
        .i((0, 0, ..))
        .and_then(|t| t.unsqueeze(0))
        .map_err(ml_err("Failed to get CLS token"))
}

/// Arg-max over class probabilities
fn top_class(probs: &[f32]) -> Option<(usize, f32)> {
    probs
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}

/// Class labels in index order from `id2label`, else `LABEL_<n>` for `num_labels`
fn labels_from_config(config: &Value) -> Result<Vec<String>> {
    let id2label = config.get("id2label").and_then(Value::as_object);
    let num_labels = id2label
        .map(|m| m.len())
        .or_else(|| config.get("num_labels").and_then(Value::as_u64).map(|n| n as usize))
        .filter(|&n| n > 0)
        .ok_or_else(|| Error::config("config.json declares neither id2label nor num_labels"))?;

    Ok((0..num_labels)
        .map(|idx| {
            id2label
                .and_then(|m| m.get(&idx.to_string()))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("LABEL_{}", idx))
        })
        .collect())
}

fn hidden_size_from_config(config: &Value) -> usize {
    config
        .get("dim")
        .or_else(|| config.get("hidden_size"))
        .and_then(Value::as_u64)
        .unwrap_or(768) as usize
}

fn read_config(model_dir: &Path) -> Result<Value> {
    let path = model_dir.join("config.json");
    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::classifier(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn download_from_hub(repo: &str, revision: &str, token: Option<&str>) -> Result<PathBuf> {
    tracing::info!("Downloading model from HuggingFace: {} @ {}", repo, revision);

    let api = ApiBuilder::new()
        .with_token(token.map(str::to_string))
        .build()
        .map_err(|e| Error::classifier(format!("Failed to initialize HuggingFace API: {}", e)))?;
    let repo_handle = api.repo(Repo::with_revision(
        repo.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let mut model_dir = None;
    for file in MODEL_FILES {
        tracing::debug!("Fetching {}", file);
        let local = repo_handle
            .get(file)
            .map_err(|e| Error::classifier(format!("Failed to download {}: {}", file, e)))?;
        if model_dir.is_none() {
            model_dir = local.parent().map(Path::to_path_buf);
        }
    }

    model_dir.ok_or_else(|| Error::classifier("Invalid HuggingFace cache path"))
}

fn load_var_builder(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let weights = model_dir.join("model.safetensors");
    if !weights.exists() {
        return Err(Error::classifier(format!(
            "model.safetensors not found in {}",
            model_dir.display()
        )));
    }

    // SAFETY: the weights file is memory-mapped read-only and not modified while loaded
    unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)
            .map_err(ml_err("Failed to load weights"))
    }
}

fn get_device(device: &str) -> Result<Device> {
    match device.to_lowercase().as_str() {
        "cuda" | "cuda:0" => Device::new_cuda(0).map_err(ml_err("Failed to initialize CUDA")),
        "mps" | "metal" => Device::new_metal(0).map_err(ml_err("Failed to initialize Metal")),
        _ => Ok(Device::Cpu),
    }
}

fn ml_err(context: &'static str) -> impl Fn(candle_core::Error) -> Error {
    move |e| Error::classifier(format!("{}: {}", context, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;
    use serde_json::json;

    const VOCAB: &[&str] = &["[UNK]", "water", "leak", "in", "coach", "s5", "fan", "broken"];

    /// Write a one-layer BERT whose head always favours its third class
    fn write_tiny_bert(dir: &Path) {
        let config = json!({
            "model_type": "bert",
            "vocab_size": VOCAB.len(),
            "hidden_size": 8,
            "num_hidden_layers": 1,
            "num_attention_heads": 2,
            "intermediate_size": 16,
            "hidden_act": "gelu",
            "hidden_dropout_prob": 0.0,
            "max_position_embeddings": 8,
            "type_vocab_size": 2,
            "initializer_range": 0.02,
            "layer_norm_eps": 1e-12,
            "pad_token_id": 0,
            "id2label": {"0": "LABEL_0", "1": "LABEL_6", "2": "LABEL_7"}
        });
        std::fs::write(dir.join("config.json"), config.to_string()).unwrap();

        let vocab: serde_json::Map<String, Value> = VOCAB
            .iter()
            .enumerate()
            .map(|(id, token)| (token.to_string(), json!(id)))
            .collect();
        let tokenizer = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {"type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]"}
        });
        std::fs::write(dir.join("tokenizer.json"), tokenizer.to_string()).unwrap();

        let bert_config: BertConfig = serde_json::from_value(config).unwrap();
        let mut varmap = VarMap::new();
        {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
            BertModel::load(vb.pp("bert"), &bert_config).unwrap();
            candle_nn::linear(8, 3, vb.pp("classifier")).unwrap();
        }

        // Zero weights make the logits equal the bias whatever the encoder does
        varmap
            .set_one("classifier.weight", Tensor::zeros((3, 8), DType::F32, &Device::Cpu).unwrap())
            .unwrap();
        varmap
            .set_one("classifier.bias", Tensor::new(&[0f32, 0.0, 5.0], &Device::Cpu).unwrap())
            .unwrap();
        varmap.save(dir.join("model.safetensors")).unwrap();
    }

    fn tiny_classifier(dir: &Path, max_length: usize) -> LocalModelClassifier {
        let config = LocalModelConfig {
            path: Some(dir.to_path_buf()),
            device: "cpu".to_string(),
            max_length,
            ..Default::default()
        };
        LocalModelClassifier::load(&config, None, DepartmentTable::default()).unwrap()
    }

    #[test]
    fn test_predict_resolves_top_class_to_department() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_bert(dir.path());
        let classifier = tiny_classifier(dir.path(), 4);

        let result = classifier.inner.predict("water leak in coach s5").unwrap();

        // softmax([0, 0, 5])
        let expected = 5f32.exp() / (2.0 + 5f32.exp());
        assert_eq!(result.label, "Security");
        assert!((result.score - expected).abs() < 1e-4);

        let scores = result.metadata.all_scores.unwrap();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0].0, "Security");
        assert!(scores[1..].iter().all(|(label, _)| label == "Catering" || label == "Medical"));
        assert_eq!(result.metadata.model.as_deref(), dir.path().to_str());
    }

    #[test]
    fn test_predict_truncates_past_position_table() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_bert(dir.path());
        let classifier = tiny_classifier(dir.path(), 4);

        // Twelve tokens against eight position embeddings
        let text = "water leak in coach s5 fan broken water leak in coach s5";
        let encoding = classifier.inner.tokenizer.encode(text, true).unwrap();
        assert_eq!(encoding.get_ids().to_vec(), vec![1u32, 2, 3, 4]);

        let result = classifier.inner.predict(text).unwrap();
        assert_eq!(result.label, "Security");
    }

    #[tokio::test]
    async fn test_classify_runs_off_the_async_runtime() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_bert(dir.path());
        let classifier = tiny_classifier(dir.path(), 4);

        let result = classifier.classify("fan broken").await.unwrap();
        assert_eq!(result.label, "Security");

        let raw = classifier.classify_raw("fan broken").await.unwrap();
        assert_eq!(raw[0]["label"], "Security");
        assert_eq!(raw.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_top_class_is_argmax() {
        assert_eq!(top_class(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(top_class(&[]), None);
    }

    #[test]
    fn test_labels_from_id2label() {
        let config = json!({"id2label": {"1": "Water", "0": "Catering"}});
        let labels = labels_from_config(&config).unwrap();
        assert_eq!(labels, vec!["Catering".to_string(), "Water".to_string()]);
    }

    #[test]
    fn test_labels_from_num_labels() {
        let config = json!({"num_labels": 3});
        let labels = labels_from_config(&config).unwrap();
        assert_eq!(labels, vec!["LABEL_0", "LABEL_1", "LABEL_2"]);
    }

    #[test]
    fn test_labels_require_some_declaration() {
        assert!(labels_from_config(&json!({})).is_err());
    }

    #[test]
    fn test_hidden_size_prefers_distilbert_dim() {
        assert_eq!(hidden_size_from_config(&json!({"dim": 384, "hidden_size": 768})), 384);
        assert_eq!(hidden_size_from_config(&json!({"hidden_size": 1024})), 1024);
        assert_eq!(hidden_size_from_config(&json!({})), 768);
    }

    #[test]
    fn test_missing_model_dir_fails() {
        let config = LocalModelConfig {
            path: Some(PathBuf::from("/nonexistent/triage-model")),
            ..Default::default()
        };
        let result = LocalModelClassifier::load(&config, None, DepartmentTable::default());
        assert!(result.is_err());
    }
}
