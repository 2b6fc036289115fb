use crate::chat::HistorySource;
use crate::config::Config;
use crate::overrides::NameOverrideStore;
use crate::recent::{RecentEntry, RecentSessions};
use crate::{Error, Result};
use agbridge_providers::{
    ContainerStorage, DockerExec, LocalStorage, RawSessionRef, SearchPattern, SessionProvider,
    Storage, create_provider,
};
use agbridge_types::{
    AgentType, DeleteOutcome, SearchHit, SessionDetail, SessionMessage, SessionPage,
    SessionSummary,
};
use std::path::Path;
use std::sync::Arc;

/// One entry point over every enabled provider plus the name overrides.
pub struct SessionFacade {
    providers: Vec<Box<dyn SessionProvider>>,
    overrides: NameOverrideStore,
    recent: RecentSessions,
}

impl SessionFacade {
    /// `providers` in preference order; `get` without an agent type tries them
    /// in this order.
    pub fn new(
        providers: Vec<Box<dyn SessionProvider>>,
        overrides: NameOverrideStore,
        recent: RecentSessions,
    ) -> Self {
        Self {
            providers,
            overrides,
            recent,
        }
    }

    pub fn from_config(config: &Config, data_dir: &Path) -> Self {
        let storage: Arc<dyn Storage> = match &config.container {
            Some(container) => Arc::new(ContainerStorage::new(
                Arc::new(DockerExec::default()),
                container.name.clone(),
                container.user.clone(),
            )),
            None => Arc::new(LocalStorage::new()),
        };

        let providers = config
            .enabled_providers()
            .into_iter()
            .map(|(agent, root)| create_provider(agent, storage.clone(), root))
            .collect();

        Self::new(
            providers,
            NameOverrideStore::new(data_dir, &config.workspace_id),
            RecentSessions::new(data_dir),
        )
    }

    fn providers_for(
        &self,
        agent_type: Option<AgentType>,
    ) -> impl Iterator<Item = &dyn SessionProvider> {
        self.providers
            .iter()
            .map(|p| p.as_ref())
            .filter(move |p| agent_type.is_none_or(|a| p.agent_type() == a))
    }

    /// Non-empty summaries of one provider. Scan failures degrade to nothing.
    fn summaries(provider: &dyn SessionProvider) -> Vec<SessionSummary> {
        let sessions = match provider.discover() {
            Ok(sessions) => sessions,
            Err(err) => {
                tracing::warn!(agent = %provider.agent_type(), error = %err, "discovery failed");
                return Vec::new();
            }
        };

        sessions
            .iter()
            .filter_map(|session| match provider.summarize(session) {
                Ok(summary) => Some(summary),
                Err(err) => {
                    tracing::warn!(id = %session.id, error = %err, "skipping unreadable session");
                    None
                }
            })
            .filter(|summary| summary.message_count > 0)
            .collect()
    }

    /// Merged listing, newest first, with name overrides applied.
    pub fn list(
        &self,
        agent_type: Option<AgentType>,
        limit: usize,
        offset: usize,
    ) -> Result<SessionPage> {
        let names = self.overrides.load()?;

        let mut sessions: Vec<SessionSummary> = self
            .providers_for(agent_type)
            .flat_map(Self::summaries)
            .collect();
        for summary in &mut sessions {
            if let Some(name) = names.get(&summary.id) {
                summary.name = Some(name.clone());
            }
        }
        sessions.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = sessions.len();
        let sessions = sessions.into_iter().skip(offset).take(limit).collect();
        Ok(SessionPage { total, sessions })
    }

    fn find(
        &self,
        id: &str,
        agent_type: Option<AgentType>,
    ) -> Result<Option<(&dyn SessionProvider, RawSessionRef)>> {
        for provider in self.providers_for(agent_type) {
            match provider.locate(id) {
                Ok(Some(session)) => return Ok(Some((provider, session))),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(agent = %provider.agent_type(), error = %err, "locate failed");
                }
            }
        }
        Ok(None)
    }

    /// Full transcript. Sessions without meaningful messages are not found.
    pub fn get(&self, id: &str, agent_type: Option<AgentType>) -> Result<SessionDetail> {
        for provider in self.providers_for(agent_type) {
            let session = match provider.locate(id) {
                Ok(Some(session)) => session,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(agent = %provider.agent_type(), error = %err, "locate failed");
                    continue;
                }
            };
            match provider.get_detail(&session) {
                Ok(detail) if !detail.messages.is_empty() => return Ok(detail),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(agent = %provider.agent_type(), id, error = %err, "read failed");
                }
            }
        }
        Err(Error::NotFound(format!("Session {}", id)))
    }

    /// Summary of one session with its override applied.
    pub fn summary(&self, id: &str, agent_type: Option<AgentType>) -> Result<SessionSummary> {
        let Some((provider, session)) = self.find(id, agent_type)? else {
            return Err(Error::NotFound(format!("Session {}", id)));
        };
        let mut summary = provider.summarize(&session)?;
        if summary.message_count == 0 {
            return Err(Error::NotFound(format!("Session {}", id)));
        }
        if let Some(name) = self.overrides.get(id)? {
            summary.name = Some(name);
        }
        Ok(summary)
    }

    /// Hits from every provider, highest match count first.
    pub fn search(
        &self,
        pattern: &SearchPattern,
        agent_type: Option<AgentType>,
    ) -> Result<Vec<SearchHit>> {
        let mut hits = Vec::new();
        for provider in self.providers_for(agent_type) {
            match provider.search(pattern) {
                Ok(found) => hits.extend(found),
                Err(err) => {
                    tracing::warn!(agent = %provider.agent_type(), error = %err, "search failed");
                }
            }
        }
        hits.sort_by(|a, b| {
            b.match_count
                .cmp(&a.match_count)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(hits)
    }

    pub fn rename(&self, id: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::PreconditionFailed(
                "Session name must not be empty".to_string(),
            ));
        }
        self.overrides.set(id, name)
    }

    pub fn clear_name(&self, id: &str) -> Result<()> {
        self.overrides.clear(id)?;
        Ok(())
    }

    /// Delete through the owning provider, then drop the override and the
    /// recent entry whatever the provider reported.
    pub fn delete(&self, id: &str, agent_type: Option<AgentType>) -> Result<DeleteOutcome> {
        let outcome = match self.find(id, agent_type)? {
            Some((provider, _)) => provider.delete(id)?,
            None => DeleteOutcome::not_found(id),
        };
        self.overrides.clear(id)?;
        self.recent.remove(id)?;
        tracing::info!(id, success = outcome.success, "delete session");
        Ok(outcome)
    }

    pub fn touch_recent(&self, id: &str, agent_type: AgentType) -> Result<()> {
        self.recent.touch(id, agent_type)
    }

    pub fn recent(&self) -> Result<Vec<RecentEntry>> {
        self.recent.list()
    }
}

impl HistorySource for SessionFacade {
    fn history(&self, agent_type: AgentType, session_id: &str) -> Result<Vec<SessionMessage>> {
        Ok(self.get(session_id, Some(agent_type))?.messages)
    }
}
