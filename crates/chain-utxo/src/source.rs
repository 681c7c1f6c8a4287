//! Boundaries to the outside world: where UTXOs come from and where signed
//! transactions go. Implementations live with the caller (explorer clients,
//! node RPC, test doubles).

use std::collections::HashSet;

use log::debug;

use crate::error::SourceError;
use crate::utxo::Utxo;

/// Supplies unspent outputs for an address.
pub trait UtxoSource {
    /// `confirmed_only` asks the source to leave out mempool outputs.
    fn fetch_unspent(&self, address: &str, confirmed_only: bool) -> Result<Vec<Utxo>, SourceError>;
}

/// Submits a raw transaction to the network.
pub trait Broadcaster {
    /// Returns the txid reported by the network.
    fn submit(&self, raw_tx: &[u8]) -> Result<String, SourceError>;
}

/// One page of a cursor-paginated UTXO listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoPage {
    pub utxos: Vec<Utxo>,
    /// `None` on the last page.
    pub next_cursor: Option<String>,
}

/// A source that returns UTXOs one page at a time.
pub trait PagedUtxoSource {
    fn fetch_page(
        &self,
        address: &str,
        confirmed_only: bool,
        cursor: Option<&str>,
    ) -> Result<UtxoPage, SourceError>;
}

/// Adapts a [`PagedUtxoSource`] into a [`UtxoSource`] by draining every
/// page. UTXOs keep page order, then in-page order.
#[derive(Debug, Clone)]
pub struct Paginated<S> {
    inner: S,
}

impl<S> Paginated<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: PagedUtxoSource> UtxoSource for Paginated<S> {
    fn fetch_unspent(&self, address: &str, confirmed_only: bool) -> Result<Vec<Utxo>, SourceError> {
        let mut utxos = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.inner.fetch_page(address, confirmed_only, cursor.as_deref())?;
            pages += 1;
            utxos.extend(page.utxos);
            match page.next_cursor {
                Some(next) => {
                    if !seen.insert(next.clone()) {
                        return Err(SourceError::Unavailable(format!(
                            "pagination cursor {next:?} repeated"
                        )));
                    }
                    cursor = Some(next);
                }
                None => break,
            }
        }

        debug!("fetched {} utxos for {address} in {pages} pages", utxos.len());
        Ok(utxos)
    }
}

impl<T: UtxoSource + ?Sized> UtxoSource for &T {
    fn fetch_unspent(&self, address: &str, confirmed_only: bool) -> Result<Vec<Utxo>, SourceError> {
        (**self).fetch_unspent(address, confirmed_only)
    }
}

impl<T: Broadcaster + ?Sized> Broadcaster for &T {
    fn submit(&self, raw_tx: &[u8]) -> Result<String, SourceError> {
        (**self).submit(raw_tx)
    }
}
