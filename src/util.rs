use regex::Regex;

lazy_static::lazy_static! {
    /// Task ids end up in resource names and file names.
    pub static ref TASK_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9][\w.-]*$").unwrap();
}

pub fn is_valid_task_id(id: &str) -> bool {
    TASK_ID_RE.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids() {
        assert!(is_valid_task_id("netconfig"));
        assert!(is_valid_task_id("primary-controller_1"));
        assert!(is_valid_task_id("openstack.network"));
        assert!(!is_valid_task_id("../etc"));
        assert!(!is_valid_task_id("a b"));
        assert!(!is_valid_task_id(""));
    }
}
