use bitcoin::script::PushBytesBuf;
use bitcoin::ScriptBuf;

use crate::error::UtxoError;

/// Encode `memo` as a null-data (OP_RETURN) output script.
///
/// The UTF-8 bytes are pushed as a single data element. Fails with
/// `MemoTooLong` when they exceed `max_bytes`.
pub fn encode(memo: &str, max_bytes: usize) -> Result<Vec<u8>, UtxoError> {
    let data = memo.as_bytes();
    if data.len() > max_bytes {
        return Err(UtxoError::MemoTooLong {
            len: data.len(),
            max: max_bytes,
        });
    }
    let push = PushBytesBuf::try_from(data.to_vec())
        .map_err(|e| UtxoError::TransactionBuildError(format!("memo push failed: {e}")))?;
    Ok(ScriptBuf::new_op_return(push).into_bytes())
}

/// Encoded script length for `memo`, without building it twice at call sites.
pub fn encoded_len(memo: &str, max_bytes: usize) -> Result<usize, UtxoError> {
    encode(memo, max_bytes).map(|script| script.len())
}
