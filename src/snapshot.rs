//! The status snapshot wire contract.
//!
//! A [`Snapshot`] is one server-reported view of the trade: a status code, a
//! version counter with a "changed" flag, an event log cursor, each party's ready
//! flag and confirmed offer, and the event records the server still holds.
//!
//! Servers speaking this protocol are loose with numeric types (ids arrive as
//! strings, flags as `0`/`1`), so every numeric field accepts both forms.

use serde::Deserialize;
use smallvec::SmallVec;

use crate::{AppId, AssetId, ContextId, ItemRef, LogPosition, Version};

/// Inline storage for one party's offer.
pub type OfferVec = SmallVec<[ItemRef; 8]>;

/// Lenient deserializers for the loosely typed wire format.
pub(crate) mod wire {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    use crate::{AppId, AssetId, ContextId, LogPosition, Slot, Version};

    /// Numeric types that can be decoded from the raw `u64` the wire carries.
    pub(crate) trait WireNumber: Sized {
        fn from_wire(raw: u64) -> Option<Self>;
    }

    impl WireNumber for u64 {
        fn from_wire(raw: u64) -> Option<Self> {
            Some(raw)
        }
    }

    impl WireNumber for u32 {
        fn from_wire(raw: u64) -> Option<Self> {
            u32::try_from(raw).ok()
        }
    }

    macro_rules! wire_newtype {
        ($($ty:ty => $inner:ty),* $(,)?) => {
            $(
                impl WireNumber for $ty {
                    fn from_wire(raw: u64) -> Option<Self> {
                        <$inner as WireNumber>::from_wire(raw).map(<$ty>::new)
                    }
                }
            )*
        };
    }

    wire_newtype!(
        Version => u64,
        LogPosition => u64,
        Slot => u32,
        AppId => u32,
        ContextId => u64,
        AssetId => u64,
    );

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberRepr {
        Int(u64),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagRepr {
        Bool(bool),
        Int(u64),
        Text(String),
    }

    fn decode<N: WireNumber, E: serde::de::Error>(repr: NumberRepr) -> Result<N, E> {
        let raw = match repr {
            NumberRepr::Int(raw) => raw,
            NumberRepr::Text(text) => text
                .trim()
                .parse::<u64>()
                .map_err(|e| E::custom(format!("invalid number {text:?}: {e}")))?,
        };
        N::from_wire(raw).ok_or_else(|| E::custom(format!("number {raw} is out of range")))
    }

    pub(crate) fn number<'de, D, N>(deserializer: D) -> Result<N, D::Error>
    where
        D: Deserializer<'de>,
        N: WireNumber,
    {
        decode(NumberRepr::deserialize(deserializer)?)
    }

    pub(crate) fn optional_number<'de, D, N>(deserializer: D) -> Result<Option<N>, D::Error>
    where
        D: Deserializer<'de>,
        N: WireNumber,
    {
        match Option::<NumberRepr>::deserialize(deserializer)? {
            Some(repr) => decode(repr).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match FlagRepr::deserialize(deserializer)? {
            FlagRepr::Bool(value) => Ok(value),
            FlagRepr::Int(value) => Ok(value != 0),
            FlagRepr::Text(text) => match text.trim() {
                "1" | "true" => Ok(true),
                "0" | "false" | "" => Ok(false),
                other => Err(D::Error::custom(format!("invalid flag {other:?}"))),
            },
        }
    }

    pub(crate) fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<FlagRepr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(FlagRepr::Bool(value)) => Ok(Some(value)),
            Some(FlagRepr::Int(value)) => Ok(Some(value != 0)),
            Some(FlagRepr::Text(text)) => match text.trim() {
                "1" | "true" => Ok(Some(true)),
                "0" | "false" => Ok(Some(false)),
                other => Err(D::Error::custom(format!("invalid flag {other:?}"))),
            },
        }
    }
}

/// Server-side status of the trade as a whole.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TradeStatus {
    /// Still negotiating.
    Ongoing,
    /// The trade went through.
    Completed,
    /// The server no longer has a trade for this session.
    Empty,
    /// One of the parties cancelled.
    Cancelled,
    /// The peer timed out.
    SessionExpired,
    /// The server failed to execute the trade.
    Failed,
    /// Both accepted, but the trade waits for out-of-band confirmation.
    PendingConfirmation,
    /// A code this library does not know.
    Unknown(u32),
}

impl TradeStatus {
    /// Decodes a wire status code.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Ongoing,
            1 => Self::Completed,
            2 => Self::Empty,
            3 => Self::Cancelled,
            4 => Self::SessionExpired,
            5 => Self::Failed,
            6 => Self::PendingConfirmation,
            other => Self::Unknown(other),
        }
    }

    /// The wire code for this status.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Ongoing => 0,
            Self::Completed => 1,
            Self::Empty => 2,
            Self::Cancelled => 3,
            Self::SessionExpired => 4,
            Self::Failed => 5,
            Self::PendingConfirmation => 6,
            Self::Unknown(code) => code,
        }
    }

    /// Returns `true` for the known codes that end the negotiation without success.
    #[must_use]
    pub const fn is_closing(self) -> bool {
        matches!(
            self,
            Self::Empty
                | Self::Cancelled
                | Self::SessionExpired
                | Self::Failed
                | Self::PendingConfirmation
        )
    }
}

/// What a remote event record reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TradeEventKind {
    /// An item was put into the actor's offer.
    ItemAdded,
    /// An item was withdrawn from the actor's offer.
    ItemRemoved,
    /// The actor became ready.
    ReadySet,
    /// The actor is no longer ready.
    ReadyUnset,
    /// The actor confirmed the trade.
    Accepted,
    /// The actor sent a chat line.
    Chat,
    /// An action code this library does not know.
    Unknown(u32),
}

impl TradeEventKind {
    /// Decodes a wire action code.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => Self::ItemAdded,
            1 => Self::ItemRemoved,
            2 => Self::ReadySet,
            3 => Self::ReadyUnset,
            4 => Self::Accepted,
            7 => Self::Chat,
            other => Self::Unknown(other),
        }
    }
}

/// Event-specific data carried by a [`TradeEvent`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventPayload {
    /// The event concerns one item.
    Item(ItemRef),
    /// A chat line.
    Text(String),
    /// Nothing beyond the kind.
    None,
}

/// A remote negotiation event, compared structurally for deduplication.
///
/// Two records with the same actor, kind, payload and timestamp are the same
/// event, whichever snapshot they arrived in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradeEvent<P> {
    /// Who did it.
    pub actor: P,
    /// What was done.
    pub kind: TradeEventKind,
    /// Item or chat text, when the kind carries one.
    pub payload: EventPayload,
    /// Server timestamp of the event.
    pub timestamp: u64,
}

impl<P> TradeEvent<P> {
    /// The item this event concerns, if any.
    #[must_use]
    pub fn item(&self) -> Option<&ItemRef> {
        match &self.payload {
            EventPayload::Item(item) => Some(item),
            _ => None,
        }
    }

    /// The chat text this event carries, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// An event record as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventRecord<P> {
    /// The acting party.
    #[serde(rename = "steamid")]
    pub actor: P,
    /// Raw action code, see [`TradeEventKind::from_code`].
    #[serde(deserialize_with = "wire::number")]
    pub action: u32,
    /// Server timestamp.
    #[serde(default, deserialize_with = "wire::number")]
    pub timestamp: u64,
    /// Application of the item, for item events.
    #[serde(rename = "appid", default, deserialize_with = "wire::optional_number")]
    pub app_id: Option<AppId>,
    /// Context of the item, for item events.
    #[serde(rename = "contextid", default, deserialize_with = "wire::optional_number")]
    pub context_id: Option<ContextId>,
    /// Asset of the item, for item events.
    #[serde(rename = "assetid", default, deserialize_with = "wire::optional_number")]
    pub asset_id: Option<AssetId>,
    /// Chat text, for chat events.
    #[serde(default)]
    pub text: Option<String>,
}

impl<P: Clone> EventRecord<P> {
    /// A record for an item event.
    #[must_use]
    pub fn item(actor: P, kind_code: u32, item: ItemRef, timestamp: u64) -> Self {
        Self {
            actor,
            action: kind_code,
            timestamp,
            app_id: Some(item.app_id),
            context_id: Some(item.context_id),
            asset_id: Some(item.asset_id),
            text: None,
        }
    }

    /// A record without an item.
    #[must_use]
    pub fn bare(actor: P, kind_code: u32, timestamp: u64) -> Self {
        Self {
            actor,
            action: kind_code,
            timestamp,
            app_id: None,
            context_id: None,
            asset_id: None,
            text: None,
        }
    }

    /// A chat record.
    #[must_use]
    pub fn chat(actor: P, text: impl Into<String>, timestamp: u64) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::bare(actor, 7, timestamp)
        }
    }

    /// The item reference, when all three parts are present.
    #[must_use]
    pub fn item_ref(&self) -> Option<ItemRef> {
        Some(ItemRef::new(self.app_id?, self.context_id?, self.asset_id?))
    }

    /// Builds the structural event used for deduplication and dispatch.
    #[must_use]
    pub fn to_event(&self) -> TradeEvent<P> {
        let kind = TradeEventKind::from_code(self.action);
        let payload = match kind {
            TradeEventKind::ItemAdded | TradeEventKind::ItemRemoved => self
                .item_ref()
                .map_or(EventPayload::None, EventPayload::Item),
            TradeEventKind::Chat => self
                .text
                .clone()
                .map_or(EventPayload::None, EventPayload::Text),
            _ => EventPayload::None,
        };
        TradeEvent {
            actor: self.actor.clone(),
            kind,
            payload,
            timestamp: self.timestamp,
        }
    }
}

/// One party's section of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PartyStatus {
    /// Whether the party is ready, if reported.
    #[serde(default, deserialize_with = "wire::optional_flag")]
    pub ready: Option<bool>,
    /// Whether the party accepted, if reported.
    #[serde(default, deserialize_with = "wire::optional_flag")]
    pub confirmed: Option<bool>,
    /// Items the server confirms this party is offering.
    #[serde(default)]
    pub assets: OfferVec,
}

impl PartyStatus {
    /// A section with the given offer and no flags.
    #[must_use]
    pub fn offering(assets: impl IntoIterator<Item = ItemRef>) -> Self {
        Self {
            ready: None,
            confirmed: None,
            assets: assets.into_iter().collect(),
        }
    }

    /// Sets the ready flag.
    #[must_use]
    pub fn with_ready(mut self, ready: bool) -> Self {
        self.ready = Some(ready);
        self
    }
}

/// One server-reported view of the trade.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Snapshot<P> {
    /// Raw status code, see [`TradeStatus::from_code`].
    #[serde(rename = "trade_status", deserialize_with = "wire::number")]
    pub status_code: u32,
    /// Set when the server replaced its offer state; the snapshot is a full state.
    #[serde(rename = "newversion", default, deserialize_with = "wire::flag")]
    pub changed: bool,
    /// State generation this snapshot describes.
    #[serde(default, deserialize_with = "wire::number")]
    pub version: Version,
    /// Event log cursor, absent or zero when the server sends none.
    #[serde(rename = "logpos", default, deserialize_with = "wire::optional_number")]
    pub log_position: Option<LogPosition>,
    /// The local party's section.
    #[serde(default)]
    pub me: Option<PartyStatus>,
    /// The remote party's section.
    #[serde(default)]
    pub them: Option<PartyStatus>,
    /// Event records, oldest first.
    #[serde(default = "Vec::new")]
    pub events: Vec<EventRecord<P>>,
}

impl<P> Snapshot<P> {
    /// An ongoing snapshot at `version` with no offers, flags or events.
    #[must_use]
    pub fn ongoing(version: Version) -> Self {
        Self::with_status(TradeStatus::Ongoing, version)
    }

    /// A snapshot carrying `status` at `version`.
    #[must_use]
    pub fn with_status(status: TradeStatus, version: Version) -> Self {
        Self {
            status_code: status.code(),
            changed: false,
            version,
            log_position: None,
            me: None,
            them: None,
            events: Vec::new(),
        }
    }

    /// Decoded status.
    #[must_use]
    pub const fn status(&self) -> TradeStatus {
        TradeStatus::from_code(self.status_code)
    }

    /// Marks the snapshot as a full state replace.
    #[must_use]
    pub fn changed(mut self) -> Self {
        self.changed = true;
        self
    }

    /// Sets both offer sections.
    #[must_use]
    pub fn with_offers(mut self, me: PartyStatus, them: PartyStatus) -> Self {
        self.me = Some(me);
        self.them = Some(them);
        self
    }

    /// Appends an event record.
    #[must_use]
    pub fn with_event(mut self, record: EventRecord<P>) -> Self {
        self.events.push(record);
        self
    }

    /// Sets the log cursor.
    #[must_use]
    pub fn with_log_position(mut self, position: LogPosition) -> Self {
        self.log_position = Some(position);
        self
    }
}

#[cfg(feature = "json")]
impl<P: serde::de::DeserializeOwned> Snapshot<P> {
    /// Parses a JSON status body.
    pub fn from_json(body: &str) -> Result<Self, crate::TradeError> {
        serde_json::from_str(body).map_err(|e| crate::TradeError::InternalError {
            context: format!("malformed status body: {e}"),
        })
    }
}
