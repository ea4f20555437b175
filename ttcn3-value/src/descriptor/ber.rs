//! BER sub-descriptor: the tag chain of a type
//!
//! A type carries the tags that wrap its encoding, listed outermost first.
//! Most types carry exactly one tag; explicit tagging in the source
//! notation adds outer entries.

/// ASN.1 tag class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagClass {
    Universal = 0,
    Application = 1,
    ContextSpecific = 2,
    Private = 3,
}

/// One tag of a BER tag chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BerTag {
    pub class: TagClass,
    /// Constructed (contains nested TLVs) rather than primitive
    pub constructed: bool,
    pub number: u32,
}

impl BerTag {
    pub const fn universal(constructed: bool, number: u32) -> Self {
        Self {
            class: TagClass::Universal,
            constructed,
            number,
        }
    }

    pub const fn application(constructed: bool, number: u32) -> Self {
        Self {
            class: TagClass::Application,
            constructed,
            number,
        }
    }

    pub const fn context(constructed: bool, number: u32) -> Self {
        Self {
            class: TagClass::ContextSpecific,
            constructed,
            number,
        }
    }

    /// Ordering key for DER set sorting: class first, then number.
    /// The constructed flag does not participate.
    pub fn order_key(&self) -> (u8, u32) {
        (self.class as u8, self.number)
    }
}

/// BER information of a type
#[derive(Debug)]
pub struct BerDescriptor {
    /// Tag chain, outermost first
    pub tags: &'static [BerTag],
}

impl BerDescriptor {
    /// The innermost tag, the one closest to the content
    pub fn inner_tag(&self) -> BerTag {
        self.tags[self.tags.len() - 1]
    }

    /// The outermost tag, the one a peer sees first
    pub fn outer_tag(&self) -> BerTag {
        self.tags[0]
    }
}

pub static BOOLEAN_BER: BerDescriptor = BerDescriptor {
    tags: &[BerTag::universal(false, 1)],
};

pub static INTEGER_BER: BerDescriptor = BerDescriptor {
    tags: &[BerTag::universal(false, 2)],
};

pub static OCTETSTRING_BER: BerDescriptor = BerDescriptor {
    tags: &[BerTag::universal(false, 4)],
};

pub static REAL_BER: BerDescriptor = BerDescriptor {
    tags: &[BerTag::universal(false, 9)],
};

// IA5String
pub static CHARSTRING_BER: BerDescriptor = BerDescriptor {
    tags: &[BerTag::universal(false, 22)],
};

pub static SEQUENCE_BER: BerDescriptor = BerDescriptor {
    tags: &[BerTag::universal(true, 16)],
};

pub static SET_BER: BerDescriptor = BerDescriptor {
    tags: &[BerTag::universal(true, 17)],
};
