//! `store_pat` / `retrieve_pat` / `store_aat` / `retrieve_aat`.
//!
//! One component parameterized by [`TokenClass`] persists the token of that class together
//! with the provider metadata, keyed by the configured issuer, so a later process run can
//! skip acquiring it again.

// self
use crate::{
	_prelude::*,
	auth::TokenClass,
	conversation::Conversation,
	phase::{Phase, PhaseFuture, PhaseOutput, Services},
	store::{CachedToken, StoreKey},
};

/// Direction of a token-cache phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOp {
	/// Write the conversation's token to the cache.
	Store,
	/// Load the token (and provider metadata) from the cache.
	Retrieve,
}

/// Token cache phase for one token class.
#[derive(Clone, Copy, Debug)]
pub struct TokenCache {
	op: CacheOp,
	class: TokenClass,
}
impl TokenCache {
	/// Builds the phase.
	pub fn new(op: CacheOp, class: TokenClass) -> Self {
		Self { op, class }
	}

	async fn store(&self, conversation: &mut Conversation, services: &Services) -> Result<()> {
		let key = StoreKey::new(self.class, conversation.config().issuer()?);
		let snapshot = CachedToken {
			token: conversation.token(self.class)?.clone(),
			provider_info: conversation.provider_info()?.clone(),
		};

		services.store.save(&key, snapshot).await?;
		conversation.trace_mut().info(format!("Stored {} as `{}`.", self.class, key.file_name()));

		Ok(())
	}

	async fn retrieve(&self, conversation: &mut Conversation, services: &Services) -> Result<()> {
		let key = StoreKey::new(self.class, conversation.config().issuer()?);
		let snapshot = services.store.load(&key).await?.ok_or_else(|| {
			Error::requirements_not_met(format!("a cached {} for `{}`", self.class, key.issuer))
		})?;

		conversation.restore_token(self.class, snapshot.token);
		conversation.replace_provider_info(snapshot.provider_info);
		conversation
			.trace_mut()
			.info(format!("Retrieved {} from `{}`.", self.class, key.file_name()));

		Ok(())
	}
}
impl Phase for TokenCache {
	fn execute_local<'a>(
		&'a self,
		conversation: &'a mut Conversation,
		services: &'a Services,
	) -> PhaseFuture<'a> {
		Box::pin(async move {
			match self.op {
				CacheOp::Store => self.store(conversation, services).await?,
				CacheOp::Retrieve => self.retrieve(conversation, services).await?,
			}

			Ok(PhaseOutput::Empty)
		})
	}
}
