//! In-process file tree used by the dispatcher tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

use super::{ClientResult, FileSystemService};
use crate::error::ClientError;
use crate::model::{NodeAttributes, Privileges, ResponseMessage};

#[derive(Clone, Debug)]
struct Node {
    is_directory: bool,
    content: Vec<u8>,
    privileges: [Privileges; 3],
}

impl Node {
    fn dir() -> Self {
        Self {
            is_directory: true,
            content: Vec::new(),
            privileges: [Privileges::FULL; 3],
        }
    }

    fn file(content: Vec<u8>) -> Self {
        Self {
            is_directory: false,
            content,
            privileges: [
                Privileges::new(true, true, false),
                Privileges::new(true, false, false),
                Privileges::new(true, false, false),
            ],
        }
    }
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    /// Overrides the computed listing of a directory.
    listings: BTreeMap<String, Vec<String>>,
    open: Vec<String>,
    unreachable: bool,
    calls: Vec<String>,
}

/// Backend double with the same semantics as the file tree service.
pub(crate) struct InMemoryService {
    state: Mutex<State>,
}

pub(crate) const MTIME: i32 = 1_700_000_000;

impl InMemoryService {
    pub(crate) fn new() -> Self {
        let mut state = State::default();
        state.nodes.insert("/".into(), Node::dir());
        Self {
            state: Mutex::new(state),
        }
    }

    pub(crate) fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(path.into(), Node::file(content.to_vec()));
        self
    }

    pub(crate) fn with_dir(self, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(path.into(), Node::dir());
        self
    }

    pub(crate) fn with_privileges(self, path: &str, privileges: [Privileges; 3]) -> Self {
        if let Some(node) = self.state.lock().unwrap().nodes.get_mut(path) {
            node.privileges = privileges;
        }
        self
    }

    pub(crate) fn with_listing(self, path: &str, names: &[&str]) -> Self {
        self.state.lock().unwrap().listings.insert(
            path.into(),
            names.iter().map(|name| name.to_string()).collect(),
        );
        self
    }

    /// Every following call fails as if the backend were down.
    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(path)
            .map(|node| node.content.clone())
    }

    pub(crate) fn is_open(&self, path: &str) -> bool {
        self.state.lock().unwrap().open.iter().any(|p| p == path)
    }

    fn enter(&self, call: &str, path: &str) -> ClientResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{call} {path}"));
        if state.unreachable {
            return Err(ClientError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                path: path.to_owned(),
            });
        }
        Ok(state)
    }
}

fn not_found(path: &str) -> ClientError {
    ClientError::NotFound(path.to_owned())
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn marker() -> ResponseMessage {
    ResponseMessage {
        message: Some("created".into()),
    }
}

#[async_trait]
impl FileSystemService for InMemoryService {
    async fn get_attributes(&self, path: &str) -> ClientResult<NodeAttributes> {
        let state = self.enter("get_attributes", path)?;
        let node = state.nodes.get(path).ok_or_else(|| not_found(path))?;
        Ok(NodeAttributes {
            is_directory: node.is_directory,
            size: node.content.len() as u64,
            modification_time: MTIME,
            owner_privileges: node.privileges[0],
            group_privileges: node.privileges[1],
            others_privileges: node.privileges[2],
        })
    }

    async fn create_file(&self, path: &str) -> ClientResult<ResponseMessage> {
        let mut state = self.enter("create_file", path)?;
        if state.nodes.contains_key(path) {
            return Err(ClientError::Conflict(path.to_owned()));
        }
        state.nodes.insert(path.into(), Node::file(Vec::new()));
        Ok(marker())
    }

    async fn rename(&self, path: &str, target_path: &str) -> ClientResult<()> {
        let mut state = self.enter("rename", path)?;
        let prefix = format!("{path}/");
        let moved: Vec<String> = state
            .nodes
            .keys()
            .filter(|key| *key == path || key.starts_with(&prefix))
            .cloned()
            .collect();
        if moved.is_empty() {
            return Err(not_found(path));
        }
        for key in moved {
            if let Some(node) = state.nodes.remove(&key) {
                let renamed = format!("{target_path}{}", &key[path.len()..]);
                state.nodes.insert(renamed, node);
            }
        }
        Ok(())
    }

    async fn truncate_file(&self, path: &str, size: u64) -> ClientResult<()> {
        let mut state = self.enter("truncate_file", path)?;
        let node = state.nodes.get_mut(path).ok_or_else(|| not_found(path))?;
        node.content.resize(size as usize, 0);
        Ok(())
    }

    async fn write_file(&self, path: &str, bytes: &[u8], offset: u64) -> ClientResult<()> {
        let mut state = self.enter("write_file", path)?;
        let node = state.nodes.get_mut(path).ok_or_else(|| not_found(path))?;
        let start = offset as usize;
        let end = start + bytes.len();
        if node.content.len() < end {
            node.content.resize(end, 0);
        }
        node.content[start..end].copy_from_slice(bytes);
        Ok(())
    }

    async fn read_file(&self, path: &str) -> ClientResult<Bytes> {
        let state = self.enter("read_file", path)?;
        let node = state.nodes.get(path).ok_or_else(|| not_found(path))?;
        Ok(Bytes::from(node.content.clone()))
    }

    async fn open_file(&self, path: &str) -> ClientResult<()> {
        let mut state = self.enter("open_file", path)?;
        state.open.push(path.to_owned());
        Ok(())
    }

    async fn release_file(&self, path: &str) -> ClientResult<()> {
        let mut state = self.enter("release_file", path)?;
        state.open.retain(|p| p != path);
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> ClientResult<ResponseMessage> {
        let mut state = self.enter("create_dir", path)?;
        if state.nodes.contains_key(path) {
            return Err(ClientError::Conflict(path.to_owned()));
        }
        state.nodes.insert(path.into(), Node::dir());
        Ok(marker())
    }

    async fn list_dir(&self, path: &str) -> ClientResult<Vec<String>> {
        let state = self.enter("list_dir", path)?;
        if let Some(names) = state.listings.get(path) {
            return Ok(names.clone());
        }
        match state.nodes.get(path) {
            Some(node) if node.is_directory => {}
            _ => return Err(not_found(path)),
        }
        Ok(state
            .nodes
            .keys()
            .filter(|key| key.as_str() != "/" && parent_of(key) == path)
            .map(|key| key.rsplit('/').next().unwrap_or_default().to_owned())
            .collect())
    }

    async fn delete_dir(&self, path: &str) -> ClientResult<()> {
        let mut state = self.enter("delete_dir", path)?;
        let prefix = format!("{path}/");
        state
            .nodes
            .retain(|key, _| key != path && !key.starts_with(&prefix));
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> ClientResult<()> {
        let mut state = self.enter("delete_file", path)?;
        state.nodes.remove(path);
        Ok(())
    }
}
