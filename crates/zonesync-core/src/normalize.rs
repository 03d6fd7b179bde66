//! Translation between provider-native entries and canonical records
//!
//! Value handling is a closed table: [`rules`] maps every [`RecordType`] to a
//! pair of pure transforms. Adding a type means adding a row there.
//!
//! Canonical value forms:
//!
//! - TXT/SPF: unquoted, `;` escaped as `\;`
//! - CNAME/ALIAS/DNAME/NS/PTR, and the target field of MX/SRV: absolute,
//!   with a trailing dot
//! - CAA: `flags tag "value"`
//! - MX/SRV/SSHFP/TLSA/LOC: fields separated by single spaces

use crate::error::{Error, Result};
use crate::record::{canonical_name, Record, RecordType};
use crate::traits::{RemoteEntry, ValueLayout};

/// Longest character-string a single TXT chunk may hold, in bytes
const TXT_CHUNK_LEN: usize = 255;

type Transform = fn(&str, &str) -> Result<String>;

/// Pair of value transforms for one record type
#[derive(Clone, Copy)]
pub struct TypeRules {
    /// provider value, zone → canonical value
    pub to_canonical: Transform,
    /// canonical value, zone → provider value
    pub from_canonical: Transform,
}

/// Lookup table from record type to its value transforms
pub fn rules(record_type: RecordType) -> TypeRules {
    use RecordType::*;
    match record_type {
        A | AAAA => TypeRules {
            to_canonical: trimmed,
            from_canonical: trimmed,
        },
        TXT | SPF => TypeRules {
            to_canonical: txt_to_canonical,
            from_canonical: txt_from_canonical,
        },
        ALIAS | CNAME | DNAME | NS | PTR => TypeRules {
            to_canonical: absolute_target,
            from_canonical: absolute_target,
        },
        MX => TypeRules {
            to_canonical: mx_value,
            from_canonical: mx_value,
        },
        SRV => TypeRules {
            to_canonical: srv_value,
            from_canonical: srv_value,
        },
        CAA => TypeRules {
            to_canonical: caa_value,
            from_canonical: caa_value,
        },
        LOC | SSHFP | TLSA => TypeRules {
            to_canonical: fields,
            from_canonical: fields,
        },
    }
}

/// Converts entries of one zone to and from canonical records
#[derive(Debug, Clone)]
pub struct Normalizer {
    zone: String,
    layout: ValueLayout,
}

impl Normalizer {
    pub fn new(zone: impl Into<String>, layout: ValueLayout) -> Self {
        Self {
            zone: zone.into().trim_end_matches('.').to_ascii_lowercase(),
            layout,
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Convert one provider entry to a canonical record.
    ///
    /// Entries of unknown types, or carrying dynamic routing data, are
    /// rejected with [`Error::UnsupportedRecordType`].
    pub fn to_canonical(&self, entry: &RemoteEntry) -> Result<Record> {
        let record_type: RecordType = entry.record_type.parse()?;
        if entry.routing.is_some() {
            return Err(Error::unsupported(format!(
                "{record_type} with dynamic routing"
            )));
        }

        let name = canonical_name(&entry.name, &self.zone)?;
        let to_canonical = rules(record_type).to_canonical;
        let values = entry
            .values
            .iter()
            .map(|v| to_canonical(v, &self.zone))
            .collect::<Result<Vec<_>>>()?;

        Ok(Record {
            name,
            record_type,
            ttl: entry.ttl,
            values,
        })
    }

    /// Convert a canonical record to the entries the provider stores.
    ///
    /// Record-set providers get one entry; per-value providers get one entry
    /// per value.
    pub fn from_canonical(&self, record: &Record) -> Result<Vec<RemoteEntry>> {
        if record.values.is_empty() {
            return Err(Error::invalid_record(format!(
                "{} has no values",
                record.key()
            )));
        }

        let from_canonical = rules(record.record_type).from_canonical;
        let values = record
            .values
            .iter()
            .map(|v| from_canonical(v, &self.zone))
            .collect::<Result<Vec<_>>>()?;

        let name = if record.name.is_empty() {
            "@".to_string()
        } else {
            record.name.clone()
        };

        let entry = |values: Vec<String>| RemoteEntry {
            id: None,
            name: name.clone(),
            record_type: record.record_type.to_string(),
            ttl: record.ttl,
            values,
            routing: None,
        };

        Ok(match self.layout {
            ValueLayout::RecordSet => vec![entry(values)],
            ValueLayout::PerValue => values.into_iter().map(|v| entry(vec![v])).collect(),
        })
    }

    /// Bring a desired record into canonical form so it compares equal to
    /// what [`Normalizer::to_canonical`] produces for the same data.
    pub fn canonicalize(&self, record: &Record) -> Result<Record> {
        let to_canonical = rules(record.record_type).to_canonical;
        Ok(Record {
            name: canonical_name(&record.name, &self.zone)?,
            record_type: record.record_type,
            ttl: record.ttl,
            values: record
                .values
                .iter()
                .map(|v| to_canonical(v, &self.zone))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

fn trimmed(value: &str, _zone: &str) -> Result<String> {
    Ok(value.trim().to_string())
}

fn fields(value: &str, _zone: &str) -> Result<String> {
    Ok(value.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn absolute_target(value: &str, zone: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::invalid_record("empty target"));
    }
    Ok(match value {
        "." => ".".to_string(),
        "@" => format!("{zone}."),
        v if v.ends_with('.') => v.to_string(),
        v => format!("{v}.{zone}."),
    })
}

fn mx_value(value: &str, zone: &str) -> Result<String> {
    match value.split_whitespace().collect::<Vec<_>>().as_slice() {
        [preference, exchange] => Ok(format!(
            "{} {}",
            preference,
            absolute_target(exchange, zone)?
        )),
        _ => Err(Error::invalid_record(format!("malformed MX value: {value}"))),
    }
}

fn srv_value(value: &str, zone: &str) -> Result<String> {
    match value.split_whitespace().collect::<Vec<_>>().as_slice() {
        [priority, weight, port, target] => Ok(format!(
            "{} {} {} {}",
            priority,
            weight,
            port,
            absolute_target(target, zone)?
        )),
        _ => Err(Error::invalid_record(format!("malformed SRV value: {value}"))),
    }
}

fn caa_value(value: &str, _zone: &str) -> Result<String> {
    let mut parts = value.trim().splitn(3, char::is_whitespace);
    let (Some(flags), Some(tag), Some(data)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::invalid_record(format!("malformed CAA value: {value}")));
    };
    let data = data.trim();
    if data.len() >= 2 && data.starts_with('"') && data.ends_with('"') {
        Ok(format!("{flags} {tag} {data}"))
    } else {
        Ok(format!("{flags} {tag} \"{data}\""))
    }
}

fn txt_to_canonical(value: &str, _zone: &str) -> Result<String> {
    let value = value.trim();
    let text = if value.starts_with('"') {
        join_quoted_chunks(value)?
    } else {
        value.to_string()
    };
    Ok(escape_semicolons(&text))
}

fn txt_from_canonical(value: &str, zone: &str) -> Result<String> {
    let text = txt_to_canonical(value, zone)?.replace("\\;", ";");
    let chunks: Vec<String> = byte_chunks(&text, TXT_CHUNK_LEN)
        .into_iter()
        .map(|chunk| format!("\"{}\"", chunk.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    if chunks.is_empty() {
        return Ok("\"\"".to_string());
    }
    Ok(chunks.join(" "))
}

/// Split `text` into pieces of at most `max` bytes, never inside a char
fn byte_chunks(text: &str, max: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (i, c) in text.char_indices() {
        if i + c.len_utf8() - start > max {
            chunks.push(&text[start..end]);
            start = end;
        }
        end = i + c.len_utf8();
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// `"abc" "def"` → `abcdef`, honouring `\"` and `\\` inside chunks
fn join_quoted_chunks(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    let mut in_chunk = false;

    while let Some(c) = chars.next() {
        match (in_chunk, c) {
            (false, '"') => in_chunk = true,
            (false, c) if c.is_whitespace() => {}
            (false, c) => {
                return Err(Error::invalid_record(format!(
                    "unexpected {c:?} between TXT chunks in {value}"
                )));
            }
            (true, '"') => in_chunk = false,
            (true, '\\') => match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            (true, c) => out.push(c),
        }
    }

    if in_chunk {
        return Err(Error::invalid_record(format!("unterminated TXT value: {value}")));
    }
    Ok(out)
}

fn escape_semicolons(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            ';' => out.push_str("\\;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, record_type: &str, values: &[&str]) -> RemoteEntry {
        RemoteEntry::new(name, record_type, 300, values.iter().copied())
    }

    fn normalizer() -> Normalizer {
        Normalizer::new("example.com.", ValueLayout::RecordSet)
    }

    #[test]
    fn test_apex_and_relative_names() {
        let n = normalizer();
        let r = n.to_canonical(&entry("@", "A", &["1.2.3.4"])).unwrap();
        assert_eq!(r.name, "");
        let r = n.to_canonical(&entry("WWW", "A", &["1.2.3.4"])).unwrap();
        assert_eq!(r.name, "www");

        let back = n.from_canonical(&Record::new("", RecordType::A, 300, ["1.2.3.4"])).unwrap();
        assert_eq!(back[0].name, "@");
    }

    #[test]
    fn test_txt_quoting() {
        let n = normalizer();
        let r = n
            .to_canonical(&entry("", "TXT", &["\"v=DKIM1; k=rsa\"", "plain"]))
            .unwrap();
        assert_eq!(r.values, vec!["v=DKIM1\\; k=rsa", "plain"]);

        let back = n.from_canonical(&r).unwrap();
        assert_eq!(back[0].values, vec!["\"v=DKIM1; k=rsa\"", "\"plain\""]);
    }

    #[test]
    fn test_txt_chunks_join_and_split() {
        let n = normalizer();
        let r = n
            .to_canonical(&entry("long", "TXT", &["\"abc\" \"def\""]))
            .unwrap();
        assert_eq!(r.values, vec!["abcdef"]);

        let long = "x".repeat(300);
        let back = n
            .from_canonical(&Record::new("long", RecordType::TXT, 300, [long.clone()]))
            .unwrap();
        assert_eq!(back[0].values[0].matches('"').count(), 4);
        assert_eq!(n.to_canonical(&back[0]).unwrap().values, vec![long]);
    }

    #[test]
    fn test_canonicalize_is_idempotent_for_txt() {
        let n = normalizer();
        let once = n
            .canonicalize(&Record::new("", RecordType::SPF, 300, ["v=spf1 -all; x"]))
            .unwrap();
        let twice = n.canonicalize(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.values, vec!["v=spf1 -all\\; x"]);
    }

    #[test]
    fn test_targets_become_absolute() {
        let n = normalizer();
        let r = n.to_canonical(&entry("www", "CNAME", &["web"])).unwrap();
        assert_eq!(r.values, vec!["web.example.com."]);

        let r = n.to_canonical(&entry("alias", "ALIAS", &["@"])).unwrap();
        assert_eq!(r.values, vec!["example.com."]);

        let r = n
            .to_canonical(&entry("", "MX", &["10 mail", "20 mx.other.net."]))
            .unwrap();
        assert_eq!(r.values, vec!["10 mail.example.com.", "20 mx.other.net."]);

        let r = n
            .to_canonical(&entry("_sip._tcp", "SRV", &["10 20 5060 sip"]))
            .unwrap();
        assert_eq!(r.values, vec!["10 20 5060 sip.example.com."]);

        assert!(n.to_canonical(&entry("", "MX", &["mail"])).is_err());
    }

    #[test]
    fn test_caa_value_quoted() {
        let n = normalizer();
        let r = n
            .to_canonical(&entry("", "CAA", &["0 issue letsencrypt.org"]))
            .unwrap();
        assert_eq!(r.values, vec!["0 issue \"letsencrypt.org\""]);
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let err = normalizer()
            .to_canonical(&entry("", "NAPTR", &["x"]))
            .unwrap_err();
        assert_eq!(err, Error::unsupported("NAPTR"));
    }

    #[test]
    fn test_dynamic_routing_rejected() {
        let mut e = entry("www", "A", &["1.2.3.4"]);
        e.routing = Some(serde_json::json!({ "pools": {} }));
        assert!(matches!(
            normalizer().to_canonical(&e),
            Err(Error::UnsupportedRecordType(_))
        ));
    }

    #[test]
    fn test_per_value_layout_splits() {
        let n = Normalizer::new("example.com", ValueLayout::PerValue);
        let record = Record::new("www", RecordType::A, 60, ["1.1.1.1", "2.2.2.2"]);
        let entries = n.from_canonical(&record).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.values.len() == 1 && e.ttl == 60));
    }

    #[test]
    fn test_txt_chunks_are_byte_limited() {
        let n = normalizer();
        let text = "é".repeat(200);
        let record = Record::new("utf8", RecordType::TXT, 300, [text.clone()]);

        let entries = n.from_canonical(&record).unwrap();
        let value = &entries[0].values[0];
        let chunks: Vec<&str> = value.split("\" \"").collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.trim_matches('"').len() <= 255));

        assert_eq!(n.to_canonical(&entries[0]).unwrap().values, vec![text]);
    }

    #[test]
    fn test_txt_backslash_is_escaped() {
        let n = normalizer();
        let record = Record::new("path", RecordType::TXT, 300, ["C:\\"]);
        let entries = n.from_canonical(&record).unwrap();
        assert_eq!(entries[0].values, vec!["\"C:\\\\\""]);
    }

    #[test]
    fn test_round_trip_every_type() {
        let n = normalizer();
        let samples = [
            Record::new("", RecordType::A, 300, ["1.2.3.4", "5.6.7.8"]),
            Record::new("v6", RecordType::AAAA, 300, ["2001:db8::1"]),
            Record::new("", RecordType::ALIAS, 300, ["edge.cdn.net."]),
            Record::new("", RecordType::CAA, 300, ["0 issue \"ca.example.net\""]),
            Record::new("www", RecordType::CNAME, 300, ["example.com."]),
            Record::new("d", RecordType::DNAME, 300, ["other.org."]),
            Record::new("loc", RecordType::LOC, 300, ["31 58 52.1 S 115 49 11.7 E 20m 10m 10m 2m"]),
            Record::new("", RecordType::MX, 300, ["10 mx1.example.com.", "20 mx2.example.com."]),
            Record::new("sub", RecordType::NS, 3600, ["ns1.other.net.", "ns2.other.net."]),
            Record::new("4", RecordType::PTR, 300, ["host.example.com."]),
            Record::new("", RecordType::SPF, 300, ["v=spf1 -all"]),
            Record::new("_srv._tcp", RecordType::SRV, 300, ["10 20 30 target.example.com."]),
            Record::new("ssh", RecordType::SSHFP, 300, ["1 1 7491973e5f8b39d5327cd4e08bc81b05f7710b49"]),
            Record::new("_443._tcp", RecordType::TLSA, 300, ["3 1 1 abcdef"]),
            Record::new("txt", RecordType::TXT, 300, ["a\\;b", "say \"hi\""]),
            Record::new("path", RecordType::TXT, 300, ["C:\\"]),
            Record::new("long", RecordType::TXT, 300, [format!("{}\\{}", "x".repeat(254), "y".repeat(10))]),
        ];

        for record in samples {
            let entries = n.from_canonical(&record).unwrap();
            assert_eq!(entries.len(), 1);
            let back = n.to_canonical(&entries[0]).unwrap();
            assert_eq!(back, record, "round trip of {record}");
        }
    }
}
