//! In-memory collaborator implementations for tests.
//!
//! Service and engine tests across the workspace need a note index and a
//! link graph without a host application attached. These fixtures keep
//! that setup in one place.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Note, NoteId};
use crate::traits::{GraphEdge, GraphIndex, GraphNode, GraphStats, NoteIndex};

/// Note index backed by a plain vector of notes.
#[derive(Default)]
pub struct InMemoryNoteIndex {
    notes: Vec<Note>,
}

impl InMemoryNoteIndex {
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn push(&mut self, note: Note) {
        self.notes.push(note);
    }
}

#[async_trait]
impl NoteIndex for InMemoryNoteIndex {
    async fn find_by_id(&self, id: &NoteId) -> Result<Option<Note>> {
        Ok(self.notes.iter().find(|n| &n.id == id).cloned())
    }

    async fn find_by_path(&self, path: &str) -> Result<Option<Note>> {
        Ok(self.notes.iter().find(|n| n.path == path).cloned())
    }

    async fn find_by_tags(&self, tags: &[String]) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .iter()
            .filter(|n| n.tags().iter().any(|t| tags.contains(t)))
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Note>> {
        Ok(self.notes.clone())
    }
}

/// Link graph backed by explicit node and edge lists.
#[derive(Default)]
pub struct InMemoryGraphIndex {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl InMemoryGraphIndex {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Add a node derived from a note.
    pub fn add_note(&mut self, note: &Note) {
        self.nodes.push(GraphNode {
            id: note.id.clone(),
            title: note.title.clone(),
            path: note.path.clone(),
        });
    }

    /// Link two notes (one directed edge).
    pub fn link(&mut self, from: &NoteId, to: &NoteId) {
        self.edges.push(GraphEdge {
            from: from.clone(),
            to: to.clone(),
        });
    }
}

#[async_trait]
impl GraphIndex for InMemoryGraphIndex {
    async fn find_connected(&self, id: &NoteId) -> Result<Vec<GraphNode>> {
        let mut connected = Vec::new();
        for edge in &self.edges {
            let neighbor = if &edge.from == id {
                Some(&edge.to)
            } else if &edge.to == id {
                Some(&edge.from)
            } else {
                None
            };
            if let Some(neighbor_id) = neighbor {
                if let Some(node) = self.nodes.iter().find(|n| &n.id == neighbor_id) {
                    if !connected.iter().any(|c: &GraphNode| c.id == node.id) {
                        connected.push(node.clone());
                    }
                }
            }
        }
        Ok(connected)
    }

    async fn find_node(&self, id: &NoteId) -> Result<Option<GraphNode>> {
        Ok(self.nodes.iter().find(|n| &n.id == id).cloned())
    }

    async fn all_nodes(&self) -> Result<Vec<GraphNode>> {
        Ok(self.nodes.clone())
    }

    async fn all_edges(&self) -> Result<Vec<GraphEdge>> {
        Ok(self.edges.clone())
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
        })
    }
}

/// Build a note with the given id, title, and raw tags.
pub fn note(id: &str, title: &str, tags: &[&str]) -> Note {
    Note::new(
        NoteId::new(id).unwrap(),
        title,
        format!("notes/{}.md", title.to_lowercase().replace(' ', "-")),
        tags.iter().map(|t| t.to_string()).collect(),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_note_index_lookup() {
        let index = InMemoryNoteIndex::new(vec![
            note("202401010001", "Alpha", &["a", "b"]),
            note("202401010002", "Beta", &["b", "c"]),
        ]);

        let found = index
            .find_by_id(&NoteId::new("202401010001").unwrap())
            .await
            .unwrap();
        assert_eq!(found.unwrap().title, "Alpha");

        let by_tag = index.find_by_tags(&["c".to_string()]).await.unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].title, "Beta");

        assert_eq!(index.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_graph_index_connections_bidirectional() {
        let a = note("202401010001", "Alpha", &[]);
        let b = note("202401010002", "Beta", &[]);
        let mut graph = InMemoryGraphIndex::default();
        graph.add_note(&a);
        graph.add_note(&b);
        graph.link(&a.id, &b.id);

        // edge is traversed from both ends
        let from_a = graph.find_connected(&a.id).await.unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].id, b.id);

        let from_b = graph.find_connected(&b.id).await.unwrap();
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_b[0].id, a.id);

        let stats = graph.stats().await.unwrap();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 1);
    }
}
