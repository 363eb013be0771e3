/// Current UTC timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        // Anything after 2024-01-01 and not absurdly far in the future.
        let now = now_millis();
        assert!(now > 1_704_067_200_000);
        assert!(now < 4_102_444_800_000);
    }
}
