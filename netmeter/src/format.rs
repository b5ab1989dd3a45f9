/// Formats a byte count with SI (base-1000) units: `999 B`, `1.0 kB`, `1.2 MB`.
pub fn byte_count_si(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    const PREFIXES: [char; 6] = ['k', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_count_si() {
        let table = [
            (0, "0 B"),
            (1, "1 B"),
            (999, "999 B"),
            (1000, "1.0 kB"),
            (1024, "1.0 kB"),
            (4792, "4.8 kB"),
            (10240, "10.2 kB"),
            (1_234_500, "1.2 MB"),
            (3_000_000_000, "3.0 GB"),
            (u64::MAX, "18.4 EB"),
        ];
        for (input, expected) in table {
            assert_eq!(byte_count_si(input), expected, "byte_count_si({})", input);
        }
    }
}
