use config::{Config, ConfigError, File};
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use dns_wire::protocol::error::Error;
use dns_wire::protocol::types::*;

/// A message, as written by a human.  Header counts default to the
/// number of questions and answers given.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct MessageDescription {
    pub id: u16,
    #[serde(default)]
    pub flags: FlagsDescription,
    pub qdcount: Option<u16>,
    pub ancount: Option<u16>,
    #[serde(default)]
    pub nscount: u16,
    #[serde(default)]
    pub arcount: u16,
    #[serde(default)]
    pub questions: Vec<QuestionDescription>,
    #[serde(default)]
    pub answers: Vec<RecordDescription>,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Default)]
pub struct FlagsDescription {
    #[serde(default)]
    pub response: bool,
    #[serde(default)]
    pub opcode: u8,
    #[serde(default)]
    pub authoritative: bool,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub recursion_desired: bool,
    #[serde(default)]
    pub recursion_available: bool,
    #[serde(default)]
    pub z: u8,
    #[serde(default)]
    pub rcode: u8,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct QuestionDescription {
    pub name: Name,
    pub qtype: String,
    #[serde(default = "default_class")]
    pub qclass: String,
    #[serde(default)]
    pub compress: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct RecordDescription {
    pub name: Name,
    pub rtype: String,
    #[serde(default = "default_class")]
    pub rclass: String,
    pub ttl: u32,
    pub rdata: String,
    /// Overrides the computed RDLENGTH, to produce a deliberately
    /// inconsistent record.
    pub rdlength: Option<u16>,
    #[serde(default)]
    pub compress: bool,
}

fn default_class() -> String {
    "IN".to_string()
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Name {
    pub domain: DomainName,
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NameVisitor;

        impl<'de> Visitor<'de> for NameVisitor {
            type Value = Name;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a domain name")
            }

            fn visit_str<E>(self, v: &str) -> Result<Name, E>
            where
                E: de::Error,
            {
                match DomainName::from_dotted_string(v) {
                    Ok(domain) => Ok(Name { domain }),
                    Err(_) => Err(de::Error::invalid_value(
                        Unexpected::Str(v),
                        &"a valid domain name",
                    )),
                }
            }
        }

        deserializer.deserialize_str(NameVisitor)
    }
}

impl MessageDescription {
    /// Load a description, in any format the `config` crate knows
    /// about, picked by file extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Build the message, resolving mnemonics and addresses.
    pub fn to_message(&self) -> Result<Message, Error> {
        let mut questions = Vec::with_capacity(self.questions.len());
        for description in &self.questions {
            questions.push(Question {
                name: description.name.domain.clone(),
                qtype: description.qtype.parse()?,
                qclass: description.qclass.parse()?,
                compress: description.compress,
            });
        }

        let mut answers = Vec::with_capacity(self.answers.len());
        for description in &self.answers {
            let mut rr = ResourceRecord::from_presentation(
                &description.name.domain.to_dotted_string(),
                &description.rtype,
                &description.rclass,
                description.ttl,
                &description.rdata,
            )?;
            if let Some(rdlength) = description.rdlength {
                rr.rdlength = rdlength;
            }
            rr.compress = description.compress;
            answers.push(rr);
        }

        let flags = Flags {
            is_response: self.flags.response,
            opcode: Opcode::from(self.flags.opcode),
            is_authoritative: self.flags.authoritative,
            is_truncated: self.flags.truncated,
            recursion_desired: self.flags.recursion_desired,
            recursion_available: self.flags.recursion_available,
            z: self.flags.z & 0b111,
            rcode: Rcode::from(self.flags.rcode),
        };

        Ok(Message {
            header: Header {
                id: self.id,
                flags,
                qdcount: self
                    .qdcount
                    .unwrap_or_else(|| u16::try_from(questions.len()).unwrap_or(u16::MAX)),
                ancount: self
                    .ancount
                    .unwrap_or_else(|| u16::try_from(answers.len()).unwrap_or(u16::MAX)),
                nscount: self.nscount,
                arcount: self.arcount,
            },
            questions,
            answers,
        })
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;
    use std::net::Ipv4Addr;

    use super::*;

    fn from_yaml(yaml: &str) -> Result<MessageDescription, ConfigError> {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn counts_default_to_lengths() {
        let description = from_yaml(
            "
id: 7
questions:
  - name: example.com
    qtype: a
",
        )
        .unwrap();
        let message = description.to_message().unwrap();

        assert_eq!(7, message.header.id);
        assert_eq!(1, message.header.qdcount);
        assert_eq!(0, message.header.ancount);
        assert_eq!(
            Question::new(
                DomainName::from_dotted_string("example.com.").unwrap(),
                QueryType::Record(RecordType::A),
                QueryClass::Record(RecordClass::IN),
            ),
            message.questions[0]
        );
    }

    #[test]
    fn explicit_counts_are_kept() {
        let description = from_yaml(
            "
id: 7
qdcount: 3
arcount: 2
",
        )
        .unwrap();
        let message = description.to_message().unwrap();

        assert_eq!(3, message.header.qdcount);
        assert_eq!(2, message.header.arcount);
        assert!(message.questions.is_empty());
    }

    #[test]
    fn rdlength_override() {
        let description = from_yaml(
            "
id: 1
answers:
  - name: example.com
    rtype: TXT
    ttl: 5
    rdata: hello
    rdlength: 2
",
        )
        .unwrap();
        let message = description.to_message().unwrap();

        assert_eq!(2, message.answers[0].rdlength);
        assert!(message.to_octets().is_err());
    }

    #[test]
    fn bad_name_is_rejected() {
        let yaml = format!(
            "
id: 1
questions:
  - name: {}.com
    qtype: A
",
            "a".repeat(64)
        );

        assert!(from_yaml(&yaml).is_err());
    }

    #[test]
    fn bad_address_is_rejected() {
        let description = from_yaml(
            "
id: 1
answers:
  - name: example.com
    rtype: A
    ttl: 5
    rdata: 1.2.3
",
        )
        .unwrap();

        assert!(description.to_message().is_err());
    }

    #[test]
    fn load_demo() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/static_message.yaml");
        let message = MessageDescription::load(&path)
            .unwrap()
            .to_message()
            .unwrap();

        assert_eq!(1234, message.header.id);
        assert!(message.header.flags.is_response);
        assert!(message.header.flags.recursion_desired);
        assert_eq!(2, message.header.qdcount);
        assert_eq!(2, message.header.ancount);
        assert_eq!(
            RecordTypeWithData::A {
                address: Ipv4Addr::new(142, 250, 72, 14)
            },
            message.answers[0].rtype_with_data
        );

        let octets = message.to_octets().unwrap();
        assert_eq!(Ok(message), Message::from_octets(&octets));
    }
}
