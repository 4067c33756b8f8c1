use crate::error::{Error, Result};

/// Compact identifier of a registered token.
pub type TokenId = u32;

/// Width in bytes of an encoded `TokenId`.
pub const ID_WIDTH: usize = 4;

/// Key tag of n-gram count entries.
pub const NGRAM_TAG: u8 = b'n';

/// Key tag of token registry entries.
pub const TOKEN_TAG: u8 = b't';

/// Key tag of model metadata entries.
pub const META_TAG: u8 = b'm';

/// Header length of an n-gram key: tag, order, direction.
const HEADER_LEN: usize = 3;

/// Which end of an n-gram its key starts from.
///
/// Forward keys list the ids as trained; reverse keys list the same window
/// last token first, so "what precedes these tokens" is a prefix scan too.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
	Forward,
	Reverse,
}

impl Direction {
	fn tag(self) -> u8 {
		match self {
			Direction::Forward => b'f',
			Direction::Reverse => b'r',
		}
	}

	fn from_tag(tag: u8) -> Option<Self> {
		match tag {
			b'f' => Some(Direction::Forward),
			b'r' => Some(Direction::Reverse),
			_ => None,
		}
	}
}

/// Decoded n-gram key. `ids` are always in natural (left-to-right) order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NgramKey {
	pub order: usize,
	pub direction: Direction,
	pub ids: Vec<TokenId>,
}

/// Encodes a full n-gram key.
///
/// Layout: `'n'`, order byte, direction byte, then `order` big-endian ids.
/// Big-endian fixed-width ids sort bytewise exactly like the integers they
/// encode, so keys sharing an order and direction sort by id sequence.
///
/// `ids` are given in natural order; a reverse key stores them back to front.
pub fn encode(order: usize, direction: Direction, ids: &[TokenId]) -> Vec<u8> {
	debug_assert_eq!(order, ids.len());
	encode_prefix(order, direction, ids)
}

/// Encodes the key prefix shared by every n-gram of `order` whose context is `context`.
///
/// For `Forward` the context is the leading tokens of the n-gram, for
/// `Reverse` the trailing ones, both given in natural order. An empty
/// context yields the prefix of the whole (order, direction) group.
pub fn encode_prefix(order: usize, direction: Direction, context: &[TokenId]) -> Vec<u8> {
	debug_assert!(order >= 1 && order <= u8::MAX as usize);
	debug_assert!(context.len() <= order);

	let mut key = Vec::with_capacity(HEADER_LEN + context.len() * ID_WIDTH);
	key.push(NGRAM_TAG);
	key.push(order as u8);
	key.push(direction.tag());
	match direction {
		Direction::Forward => context.iter().for_each(|id| key.extend_from_slice(&id.to_be_bytes())),
		Direction::Reverse => context.iter().rev().for_each(|id| key.extend_from_slice(&id.to_be_bytes())),
	}
	key
}

/// Exact inverse of [`encode`].
///
/// # Errors
/// Returns `Error::InvalidKey` if the tag, direction or length do not
/// describe a complete n-gram key.
pub fn decode(key: &[u8]) -> Result<NgramKey> {
	if key.len() < HEADER_LEN || key[0] != NGRAM_TAG {
		return Err(Error::InvalidKey(format!("not an n-gram key: {:?}", key)));
	}
	let order = key[1] as usize;
	let direction = Direction::from_tag(key[2])
		.ok_or_else(|| Error::InvalidKey(format!("unknown direction byte {:#04x}", key[2])))?;

	let body = &key[HEADER_LEN..];
	if order == 0 || body.len() != order * ID_WIDTH {
		return Err(Error::InvalidKey(format!(
			"order {} key carries {} id bytes",
			order,
			body.len()
		)));
	}

	let mut ids = decode_ids(body)?;
	if direction == Direction::Reverse {
		ids.reverse();
	}
	Ok(NgramKey { order, direction, ids })
}

/// Decodes a run of fixed-width ids, as left behind by stripping a key prefix.
pub fn decode_ids(bytes: &[u8]) -> Result<Vec<TokenId>> {
	if bytes.len() % ID_WIDTH != 0 {
		return Err(Error::InvalidKey(format!("{} bytes is not a whole number of ids", bytes.len())));
	}
	Ok(bytes
		.chunks_exact(ID_WIDTH)
		.map(|chunk| TokenId::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
		.collect())
}

/// Encodes a stored count.
pub fn encode_count(count: u64) -> [u8; 8] {
	count.to_be_bytes()
}

/// Decodes a stored count.
pub fn decode_count(value: &[u8]) -> Result<u64> {
	let bytes: [u8; 8] = value
		.try_into()
		.map_err(|_| Error::InvalidValue(format!("count must be 8 bytes, got {}", value.len())))?;
	Ok(u64::from_be_bytes(bytes))
}

/// Encodes a token id as a stored value.
pub fn encode_id(id: TokenId) -> [u8; ID_WIDTH] {
	id.to_be_bytes()
}

/// Decodes a token id stored as a value.
pub fn decode_id(value: &[u8]) -> Result<TokenId> {
	let bytes: [u8; ID_WIDTH] = value
		.try_into()
		.map_err(|_| Error::InvalidValue(format!("token id must be {} bytes, got {}", ID_WIDTH, value.len())))?;
	Ok(TokenId::from_be_bytes(bytes))
}
