
/// One chunk of an allele name, numeric chunks compare by value
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum AlleleKeyPart {
    Number(u64),
    Text(String),
}

/// Splits an allele name into numeric and text chunks so that `*2 < *10` and `*4 < *4A`.
/// # Arguments
/// * `name` - the allele name without the leading `*`, e.g. "1.001" or "4A"
pub fn allele_sort_key(name: &str) -> Vec<AlleleKeyPart> {
    let mut parts = vec![];
    let mut current = String::new();
    let mut in_digits = false;
    for c in name.chars() {
        let is_digit = c.is_ascii_digit();
        if !current.is_empty() && is_digit != in_digits {
            parts.push(finish_part(std::mem::take(&mut current), in_digits));
        }
        in_digits = is_digit;
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(finish_part(current, in_digits));
    }
    parts
}

fn finish_part(chunk: String, numeric: bool) -> AlleleKeyPart {
    if numeric {
        // overly long digit runs fall back to text comparison
        match chunk.parse() {
            Ok(n) => AlleleKeyPart::Number(n),
            Err(_) => AlleleKeyPart::Text(chunk)
        }
    } else {
        AlleleKeyPart::Text(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_parts() {
        assert_eq!(allele_sort_key("1.001"), vec![
            AlleleKeyPart::Number(1), AlleleKeyPart::Text(".".to_string()), AlleleKeyPart::Number(1)
        ]);
        assert_eq!(allele_sort_key("4A"), vec![AlleleKeyPart::Number(4), AlleleKeyPart::Text("A".to_string())]);
        assert!(allele_sort_key("").is_empty());
    }

    #[test]
    fn test_sort_order() {
        let mut names = vec!["10", "4A", "2", "4", "1.002", "1.001", "S1"];
        names.sort_by_key(|n| allele_sort_key(n));
        assert_eq!(names, vec!["1.001", "1.002", "2", "4", "4A", "10", "S1"]);
    }
}
