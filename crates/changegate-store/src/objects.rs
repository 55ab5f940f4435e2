//! Content-addressed object persistence: trees and commits.
//!
//! An object's digest is the SHA256 of its kind and canonical JSON payload,
//! so writing the same object twice is a no-op.

use crate::errors::{from_rusqlite, missing_object, serialization_error, Result};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};

const KIND_TREE: &str = "tree";
const KIND_COMMIT: &str = "commit";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObject {
    pub tree: String,
    pub parents: Vec<String>,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

fn object_digest(kind: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

fn put_object(conn: &Connection, kind: &str, payload: &str) -> Result<String> {
    let digest = object_digest(kind, payload);
    conn.execute(
        "INSERT OR IGNORE INTO objects (digest, kind, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![digest, kind, payload, Utc::now().timestamp()],
    )
    .map_err(from_rusqlite)?;
    Ok(digest)
}

fn get_object(conn: &Connection, kind: &str, digest: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT payload FROM objects WHERE digest = ?1 AND kind = ?2",
        params![digest, kind],
        |row| row.get(0),
    )
    .optional()
    .map_err(from_rusqlite)
}

pub fn put_tree(conn: &Connection, snapshot: &Snapshot) -> Result<String> {
    put_object(conn, KIND_TREE, &snapshot.to_canonical_json()?)
}

pub fn load_tree(conn: &Connection, digest: &str) -> Result<Snapshot> {
    let payload = get_object(conn, KIND_TREE, digest)?.ok_or_else(|| missing_object(digest))?;
    serde_json::from_str(&payload).map_err(|e| serialization_error("decode_tree", e))
}

pub fn put_commit(conn: &Connection, commit: &CommitObject) -> Result<String> {
    let payload =
        serde_json::to_string(commit).map_err(|e| serialization_error("encode_commit", e))?;
    put_object(conn, KIND_COMMIT, &payload)
}

pub fn find_commit(conn: &Connection, hash: &str) -> Result<Option<CommitObject>> {
    get_object(conn, KIND_COMMIT, hash)?
        .map(|payload| {
            serde_json::from_str(&payload).map_err(|e| serialization_error("decode_commit", e))
        })
        .transpose()
}

pub fn load_commit(conn: &Connection, hash: &str) -> Result<CommitObject> {
    find_commit(conn, hash)?.ok_or_else(|| missing_object(hash))
}

/// Tree of a commit
pub fn load_commit_tree(conn: &Connection, hash: &str) -> Result<Snapshot> {
    let commit = load_commit(conn, hash)?;
    load_tree(conn, &commit.tree)
}

/// `hash` and every commit reachable from it, breadth-first
pub fn ancestors(conn: &Connection, hash: &str) -> Result<Vec<(String, CommitObject)>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([hash.to_string()]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let commit = load_commit(conn, &current)?;
        queue.extend(commit.parents.iter().cloned());
        out.push((current, commit));
    }
    Ok(out)
}

pub fn is_ancestor(conn: &Connection, ancestor: &str, descendant: &str) -> Result<bool> {
    Ok(ancestors(conn, descendant)?
        .iter()
        .any(|(hash, _)| hash == ancestor))
}

/// Nearest commit reachable from both `a` and `b`
pub fn merge_base(conn: &Connection, a: &str, b: &str) -> Result<Option<String>> {
    let from_a: HashSet<String> = ancestors(conn, a)?.into_iter().map(|(h, _)| h).collect();
    Ok(ancestors(conn, b)?
        .into_iter()
        .map(|(h, _)| h)
        .find(|h| from_a.contains(h)))
}
