use sha1::{Digest, Sha1};

pub fn sha1(payload: &str) -> String {
    let hash = Sha1::digest(payload);
    base16ct::lower::encode_string(&hash)
}

/// Maps `(flag_key, identifier)` to a bucket in `[0, 100)`.
///
/// The bucket is the first 7 hex digits of `sha1("{flag_key}:{identifier}")` modulo 100.
/// Other SDKs computing rollouts for the same flags must use the same algorithm.
///
/// # Examples
///
/// ```rust
/// use flagcore::rollout_percentage;
///
/// let bucket = rollout_percentage("new-checkout", "user-1");
/// assert!(bucket < 100);
/// assert_eq!(bucket, rollout_percentage("new-checkout", "user-1"));
/// ```
pub fn rollout_percentage(flag_key: &str, identifier: &str) -> u8 {
    let hash = sha1(format!("{flag_key}:{identifier}").as_str());
    let num = u32::from_str_radix(&hash[..7], 16).unwrap_or(0);
    (num % 100) as u8
}
