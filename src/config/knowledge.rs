use crate::knowledge::{ builtin, InvalidKnowledge, KnowledgeBase };
use log::{ info, warn };
use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Knowledge file IO error: {0}")] Io(#[from] std::io::Error),
    #[error("Knowledge JSON parsing error: {0}")] Json(#[from] serde_json::Error),
    #[error("Invalid knowledge base: {0}")] Invalid(#[from] InvalidKnowledge),
}

/// A knowledge base snapshot plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedKnowledge {
    pub knowledge: Arc<KnowledgeBase>,
    pub source: Option<PathBuf>,
    pub loaded_at: SystemTime,
}

impl LoadedKnowledge {
    pub fn builtin() -> Self {
        Self {
            knowledge: Arc::new(builtin::knowledge_base().clone()),
            source: None,
            loaded_at: SystemTime::now(),
        }
    }
}

pub fn load_knowledge<P: AsRef<Path>>(path: P) -> Result<KnowledgeBase, KnowledgeError> {
    let file_content = fs::read_to_string(path.as_ref())?;
    let knowledge: KnowledgeBase = serde_json::from_str(&file_content)?;
    knowledge.validate()?;
    Ok(knowledge)
}

/// Loads from `path` when given, otherwise falls back to the built-in table.
pub fn initialize_knowledge(path: Option<&str>) -> Result<LoadedKnowledge, KnowledgeError> {
    match path {
        Some(path) if !path.trim().is_empty() => {
            let knowledge = load_knowledge(path)?;
            if knowledge.is_empty() {
                warn!("Knowledge file '{}' has no symptom entries; every message gets the fallback reply", path);
            } else {
                info!("Loaded {} symptom entries from '{}'", knowledge.len(), path);
            }
            Ok(LoadedKnowledge {
                knowledge: Arc::new(knowledge),
                source: Some(PathBuf::from(path)),
                loaded_at: SystemTime::now(),
            })
        }
        _ => {
            let loaded = LoadedKnowledge::builtin();
            info!("Using built-in knowledge base ({} symptom entries)", loaded.knowledge.len());
            Ok(loaded)
        }
    }
}

/// Returns a fresh snapshot when the source file was modified after the
/// current one was loaded. Built-in knowledge never reloads.
pub fn reload_knowledge_if_changed(
    current: &LoadedKnowledge
) -> Result<Option<LoadedKnowledge>, KnowledgeError> {
    let path = match &current.source {
        Some(path) => path,
        None => {
            return Ok(None);
        }
    };

    let modified = fs::metadata(path)?.modified()?;
    if modified <= current.loaded_at {
        return Ok(None);
    }

    info!("Knowledge file '{}' changed, reloading...", path.display());
    let knowledge = load_knowledge(path)?;
    Ok(
        Some(LoadedKnowledge {
            knowledge: Arc::new(knowledge),
            source: Some(path.clone()),
            loaded_at: SystemTime::now(),
        })
    )
}
