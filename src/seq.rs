//! DNA sequence model, SNV-carrying sequences and substitution enumeration

use crate::{SiteBreakError, SiteBreakResult};
use std::fmt;
use std::str::FromStr;

/// The four unambiguous bases used to enumerate substitutions
pub const BASES: [char; 4] = ['A', 'C', 'G', 'T'];

const PYRIMIDINES: [char; 2] = ['C', 'T'];

/// Complement a single base, preserving case
pub fn complement_base(base: char) -> char {
    match base {
        'A' => 'T',
        'C' => 'G',
        'G' => 'C',
        'T' => 'A',
        'a' => 't',
        'c' => 'g',
        'g' => 'c',
        't' => 'a',
        'N' => 'N',
        'n' => 'n',
        other => other,
    }
}

/// Complement a sequence of bases
pub fn complement(text: &str) -> String {
    text.chars().map(complement_base).collect()
}

/// Reverse complement a sequence of bases
pub fn revcomp(text: &str) -> String {
    text.chars().rev().map(complement_base).collect()
}

fn is_valid_base(base: char) -> bool {
    matches!(base.to_ascii_uppercase(), 'A' | 'C' | 'G' | 'T' | 'N')
}

/// An immutable DNA sequence over {A,C,G,T,N}, stored uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    bases: String,
}

impl Sequence {
    pub fn new(text: &str) -> SiteBreakResult<Self> {
        if let Some(bad) = text.chars().find(|&c| !is_valid_base(c)) {
            return Err(SiteBreakError::InvalidSequence(format!(
                "unexpected character '{}' in sequence: {}",
                bad, text
            )));
        }
        Ok(Self {
            bases: text.to_ascii_uppercase(),
        })
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.bases
    }

    /// Base at a 0-based position. Panics if out of range.
    pub fn base_at(&self, pos: usize) -> char {
        self.bases.as_bytes()[pos] as char
    }

    pub fn revcomp(&self) -> Self {
        Self {
            bases: revcomp(&self.bases),
        }
    }

    /// Turn the base at `pos` into a two-allele site, keeping the original
    /// base as allele 0 and `new_base` as allele 1.
    pub fn snv_at(&self, pos: usize, new_base: char) -> SiteBreakResult<SequenceWithSnv> {
        if pos >= self.len() {
            return Err(SiteBreakError::InvalidSubstitution(format!(
                "position {} is out of range for a sequence of length {}",
                pos,
                self.len()
            )));
        }
        let new_base = new_base.to_ascii_uppercase();
        if !BASES.contains(&new_base) {
            return Err(SiteBreakError::InvalidSubstitution(format!(
                "'{}' is not a valid substitution base",
                new_base
            )));
        }
        let original = self.base_at(pos);
        if original == new_base {
            return Err(SiteBreakError::InvalidSubstitution(format!(
                "substitution at position {} does not change the base '{}'",
                pos, original
            )));
        }

        Ok(SequenceWithSnv {
            left: Sequence {
                bases: self.bases[..pos].to_string(),
            },
            alleles: [original, new_base],
            right: Sequence {
                bases: self.bases[pos + 1..].to_string(),
            },
        })
    }

    /// The 3 variants obtained by replacing the base at `pos` with each
    /// other unambiguous base.
    pub fn substitutions_at(&self, pos: usize) -> SiteBreakResult<Vec<NamedVariant>> {
        if pos >= self.len() {
            return Err(SiteBreakError::InvalidSubstitution(format!(
                "position {} is out of range for a sequence of length {}",
                pos,
                self.len()
            )));
        }
        let original = self.base_at(pos);
        let mut variants = Vec::new();
        for base in BASES {
            if base == original {
                continue;
            }
            variants.push(NamedVariant {
                label: SubstitutionLabel::primary(pos, base),
                sequence: self.snv_at(pos, base)?,
            });
        }
        Ok(variants)
    }

    /// Every possible single-base substitution outside `ignore_positions`,
    /// in position order. Labels are unique by construction.
    pub fn all_substitutions(&self, ignore_positions: &[usize]) -> Vec<NamedVariant> {
        (0..self.len())
            .filter(|pos| !ignore_positions.contains(pos))
            .flat_map(|pos| {
                self.substitutions_at(pos)
                    .expect("in-range position cannot fail")
            })
            .collect()
    }

    /// Rebuild the SNV sequence a primary substitution label denotes.
    pub fn snv_from_label(&self, label: &SubstitutionLabel) -> SiteBreakResult<SequenceWithSnv> {
        match label.kind {
            SubstitutionKind::Primary => self.snv_at(label.pos, label.base),
            SubstitutionKind::Auxiliary => Err(SiteBreakError::InvalidSubstitution(format!(
                "label {} denotes an auxiliary substitution, not a primary one",
                label
            ))),
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.bases)
    }
}

impl FromStr for Sequence {
    type Err = SiteBreakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sequence::new(s)
    }
}

/// Whether a substitution label denotes the primary enumerated change or a
/// secondary change made while holding a reference SNV fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubstitutionKind {
    Primary,
    Auxiliary,
}

/// A typed substitution identifier, rendered as `<pos>,<base>` or
/// `add:<pos>,<base>` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubstitutionLabel {
    pub kind: SubstitutionKind,
    pub pos: usize,
    pub base: char,
}

impl SubstitutionLabel {
    pub fn primary(pos: usize, base: char) -> Self {
        Self {
            kind: SubstitutionKind::Primary,
            pos,
            base,
        }
    }

    pub fn auxiliary(pos: usize, base: char) -> Self {
        Self {
            kind: SubstitutionKind::Auxiliary,
            pos,
            base,
        }
    }
}

impl fmt::Display for SubstitutionLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            SubstitutionKind::Primary => write!(f, "{},{}", self.pos, self.base),
            SubstitutionKind::Auxiliary => write!(f, "add:{},{}", self.pos, self.base),
        }
    }
}

impl FromStr for SubstitutionLabel {
    type Err = SiteBreakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = match s.strip_prefix("add:") {
            Some(rest) => (SubstitutionKind::Auxiliary, rest),
            None => (SubstitutionKind::Primary, s),
        };

        let (pos_text, base_text) = rest.split_once(',').ok_or_else(|| {
            SiteBreakError::InvalidSubstitution(format!("malformed substitution label: {}", s))
        })?;

        let pos = pos_text.parse::<usize>().map_err(|_| {
            SiteBreakError::InvalidSubstitution(format!(
                "invalid position in substitution label: {}",
                s
            ))
        })?;

        let mut base_chars = base_text.chars();
        let base = match (base_chars.next(), base_chars.next()) {
            (Some(base), None) if BASES.contains(&base.to_ascii_uppercase()) => {
                base.to_ascii_uppercase()
            }
            _ => {
                return Err(SiteBreakError::InvalidSubstitution(format!(
                    "invalid base in substitution label: {}",
                    s
                )))
            }
        };

        Ok(Self { kind, pos, base })
    }
}

/// A labelled sequence variant produced by substitution enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct NamedVariant {
    pub label: SubstitutionLabel,
    pub sequence: SequenceWithSnv,
}

/// A DNA sequence carrying two alternative alleles at one position,
/// written `LEFT[A/B]RIGHT`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceWithSnv {
    left: Sequence,
    alleles: [char; 2],
    right: Sequence,
}

impl SequenceWithSnv {
    pub fn new(left: Sequence, alleles: [char; 2], right: Sequence) -> SiteBreakResult<Self> {
        for allele in alleles {
            if !is_valid_base(allele) {
                return Err(SiteBreakError::InvalidSequence(format!(
                    "invalid allele '{}'",
                    allele
                )));
            }
        }
        Ok(Self {
            left,
            alleles: [
                alleles[0].to_ascii_uppercase(),
                alleles[1].to_ascii_uppercase(),
            ],
            right,
        })
    }

    /// Parse the bracket notation, e.g. `AAG[C/T]TAT`.
    pub fn from_text(text: &str) -> SiteBreakResult<Self> {
        let malformed = || {
            SiteBreakError::InvalidSequence(format!(
                "expected bracket notation LEFT[A/B]RIGHT, got: {}",
                text
            ))
        };

        let (left_text, rest) = text.split_once('[').ok_or_else(malformed)?;
        let (mid, right_text) = rest.split_once(']').ok_or_else(malformed)?;
        let (allele_1, allele_2) = mid.split_once('/').ok_or_else(malformed)?;

        let mut first = allele_1.chars();
        let mut second = allele_2.chars();
        let alleles = match (first.next(), first.next(), second.next(), second.next()) {
            (Some(a), None, Some(b), None) => [a, b],
            _ => return Err(malformed()),
        };

        Self::new(Sequence::new(left_text)?, alleles, Sequence::new(right_text)?)
    }

    pub fn left(&self) -> &Sequence {
        &self.left
    }

    pub fn right(&self) -> &Sequence {
        &self.right
    }

    pub fn alleles(&self) -> [char; 2] {
        self.alleles
    }

    pub fn length(&self) -> usize {
        self.left.len() + 1 + self.right.len()
    }

    pub fn snv_position(&self) -> usize {
        self.left.len()
    }

    pub fn revcomp(&self) -> Self {
        Self {
            left: self.right.revcomp(),
            alleles: [
                complement_base(self.alleles[0]),
                complement_base(self.alleles[1]),
            ],
            right: self.left.revcomp(),
        }
    }

    /// The concrete sequence carrying the allele with the given index.
    pub fn sequence_variant(&self, allele_index: usize) -> Sequence {
        Sequence {
            bases: format!(
                "{}{}{}",
                self.left.as_str(),
                self.alleles[allele_index],
                self.right.as_str()
            ),
        }
    }

    /// Clip the flanks to at most `before` bases on the left and `after` on
    /// the right of the variant position.
    pub fn subsequence(&self, before: usize, after: usize) -> Self {
        let left_start = self.left.len().saturating_sub(before);
        let right_end = self.right.len().min(after);
        Self {
            left: Sequence {
                bases: self.left.as_str()[left_start..].to_string(),
            },
            alleles: self.alleles,
            right: Sequence {
                bases: self.right.as_str()[..right_end].to_string(),
            },
        }
    }

    pub fn in_pyrimidine_context(&self) -> bool {
        PYRIMIDINES.contains(&self.alleles[0])
    }

    /// The same variant, reverse-complemented if needed so that allele 0 is
    /// a pyrimidine.
    pub fn to_pyrimidine_context(&self) -> Self {
        if self.in_pyrimidine_context() {
            self.clone()
        } else {
            self.revcomp()
        }
    }

    /// The 3 secondary substitutions at a flank position, keeping both
    /// alleles at the SNV position intact.
    pub fn auxiliary_substitutions_at(&self, pos: usize) -> SiteBreakResult<Vec<NamedVariant>> {
        if pos == self.snv_position() {
            return Err(SiteBreakError::InvalidSubstitution(format!(
                "position {} is the protected SNV position",
                pos
            )));
        }
        if pos >= self.length() {
            return Err(SiteBreakError::InvalidSubstitution(format!(
                "position {} is out of range for a variant of length {}",
                pos,
                self.length()
            )));
        }

        let in_left = pos < self.left.len();
        let (flank, pos_in_flank) = if in_left {
            (&self.left, pos)
        } else {
            (&self.right, pos - self.left.len() - 1)
        };
        let original = flank.base_at(pos_in_flank);

        let mut variants = Vec::new();
        for base in BASES {
            if base == original {
                continue;
            }
            let mut replaced = flank.as_str().to_string();
            replaced.replace_range(pos_in_flank..pos_in_flank + 1, &base.to_string());
            let replaced = Sequence { bases: replaced };

            let sequence = if in_left {
                Self {
                    left: replaced,
                    alleles: self.alleles,
                    right: self.right.clone(),
                }
            } else {
                Self {
                    left: self.left.clone(),
                    alleles: self.alleles,
                    right: replaced,
                }
            };

            variants.push(NamedVariant {
                label: SubstitutionLabel::auxiliary(pos, base),
                sequence,
            });
        }
        Ok(variants)
    }

    /// Every secondary substitution over both flanks, holding the SNV fixed.
    pub fn auxiliary_substitutions(&self) -> Vec<NamedVariant> {
        (0..self.length())
            .filter(|&pos| pos != self.snv_position())
            .flat_map(|pos| {
                self.auxiliary_substitutions_at(pos)
                    .expect("non-SNV in-range position cannot fail")
            })
            .collect()
    }
}

impl fmt::Display for SequenceWithSnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}[{}/{}]{}",
            self.left, self.alleles[0], self.alleles[1], self.right
        )
    }
}

impl FromStr for SequenceWithSnv {
    type Err = SiteBreakError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SequenceWithSnv::from_text(s)
    }
}
