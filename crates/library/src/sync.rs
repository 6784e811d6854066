//! Annotations: highlights and notes kept locally and mirrored to the
//! backend, bookmarks kept locally only.
//!
//! Local writes come first and their failures are returned. Pushes to the
//! backend are best effort (logged by the remote client) except for deletes,
//! which the user asked for and needs to hear about when they fail.

use crate::Library;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sastra_models::{Bookmark, Highlight, Note};
use serde_json::Value;
use tracing::instrument;

impl Library {
    /// Store a highlight locally, then push it to the backend.
    ///
    /// Returns the highlight carrying its local id.
    #[instrument(skip_all, fields(toc_url = %highlight.toc_url))]
    pub async fn add_highlight(&self, highlight: &Highlight) -> Result<Highlight> {
        let id = self.store.highlights().add(highlight).await.or_raise(|| ErrorKind::Store)?;
        let stored = Highlight { id: Some(id), ..highlight.without_id() };
        self.remote.sync_highlight(&stored).await;
        Ok(stored)
    }

    /// Local highlights of a toc entry.
    pub async fn highlights_for(&self, toc_url: &str) -> Result<Vec<Highlight>> {
        self.store.highlights().where_eq("toc_url", &Value::from(toc_url)).await.or_raise(|| ErrorKind::Store)
    }

    /// Copy remote highlights of a toc entry that have no local counterpart
    /// into the local store. Returns how many were added.
    ///
    /// The remote bookkeeping columns are not copied. A selection the backend
    /// holds twice is added once.
    #[instrument(skip(self))]
    pub async fn pull_highlights(&self, toc_url: &str) -> Result<usize> {
        let mut local = self.highlights_for(toc_url).await?;
        let mut added = 0;
        for remote in self.remote.fetch_highlights(toc_url).await {
            if local.iter().any(|highlight| highlight.same_selection(&remote)) {
                continue;
            }
            let selection = remote.selection();
            let id = self.store.highlights().add(&selection).await.or_raise(|| ErrorKind::Store)?;
            local.push(Highlight { id: Some(id), ..selection });
            added += 1;
        }
        tracing::debug!(added, "Pulled highlights");
        Ok(added)
    }

    /// Delete a highlight locally and its remote copy.
    ///
    /// The highlight is identified by its local id and matched against the
    /// stored row, not the caller's copy. The remote copy is found by value,
    /// as the two sides number highlights independently. A highlight without
    /// a local id was never stored and is left alone. When the remote copies
    /// can't be listed nothing is deleted.
    #[instrument(skip_all, fields(toc_url = %highlight.toc_url, id = highlight.id))]
    pub async fn remove_highlight(&self, highlight: &Highlight) -> Result<()> {
        let Some(id) = highlight.id else {
            tracing::warn!("Highlight has no local id; nothing to remove");
            return Ok(());
        };
        let stored = match self.store.highlights().get(id).await.or_raise(|| ErrorKind::Store)? {
            Some(stored) => stored,
            None => {
                tracing::debug!("Highlight not in the local store; matching the given copy");
                highlight.clone()
            },
        };
        let remote = self.remote.try_fetch_highlights(&stored.toc_url).await.or_raise(|| ErrorKind::Remote)?;
        self.store.highlights().delete(id).await.or_raise(|| ErrorKind::Store)?;
        match remote.iter().find(|candidate| stored.same_selection(candidate)) {
            Some(copy) => self.remote.delete_highlight(copy).await.or_raise(|| ErrorKind::Remote),
            None => {
                tracing::info!("No remote copy of highlight");
                Ok(())
            },
        }
    }

    /// Write a note locally, then push it to the backend.
    #[instrument(skip(self, text))]
    pub async fn save_note(&self, toc_url: &str, text: &str) -> Result<()> {
        self.store.notes().put(&Note::new(toc_url, text)).await.or_raise(|| ErrorKind::Store)?;
        self.remote.sync_note(toc_url, text).await;
        Ok(())
    }

    /// The note of a toc entry, from the local store or else the backend. A
    /// note found remotely is cached locally.
    #[instrument(skip(self))]
    pub async fn load_note(&self, toc_url: &str) -> Result<Option<Note>> {
        if let Some(note) = self.store.notes().get(toc_url).await.or_raise(|| ErrorKind::Store)? {
            return Ok(Some(note));
        }
        let Some(note) = self.remote.fetch_note(toc_url).await else {
            return Ok(None);
        };
        self.store.notes().put(&note).await.or_raise(|| ErrorKind::Store)?;
        Ok(Some(note))
    }

    /// Delete notes locally in one transaction, then remotely in one request.
    #[instrument(skip_all, fields(notes = toc_urls.len()))]
    pub async fn delete_notes(&self, toc_urls: &[String]) -> Result<()> {
        if toc_urls.is_empty() {
            return Ok(());
        }
        self.store.notes().bulk_delete(toc_urls).await.or_raise(|| ErrorKind::Store)?;
        self.remote.bulk_delete_notes(toc_urls).await.or_raise(|| ErrorKind::Remote)
    }

    /// Push every local note to the backend. Returns how many were pushed.
    pub async fn push_notes(&self) -> Result<usize> {
        let notes = self.store.notes().get_all().await.or_raise(|| ErrorKind::Store)?;
        for note in &notes {
            self.remote.sync_note(&note.toc_url, &note.text).await;
        }
        tracing::info!(notes = notes.len(), "Pushed notes");
        Ok(notes.len())
    }

    /// Add the bookmark, or remove it if one with the same url exists.
    /// Returns whether the url is bookmarked afterwards.
    pub async fn toggle_bookmark(&self, bookmark: &Bookmark) -> Result<bool> {
        let bookmarks = self.store.bookmarks();
        if bookmarks.get(&bookmark.url).await.or_raise(|| ErrorKind::Store)?.is_some() {
            bookmarks.delete(&bookmark.url).await.or_raise(|| ErrorKind::Store)?;
            return Ok(false);
        }
        bookmarks.put(bookmark).await.or_raise(|| ErrorKind::Store)?;
        Ok(true)
    }

    pub async fn bookmarks(&self) -> Result<Vec<Bookmark>> {
        self.store.bookmarks().get_all().await.or_raise(|| ErrorKind::Store)
    }
}
