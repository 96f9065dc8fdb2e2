use cairn_lex::LexemeSet;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u32)]
pub enum Expressions {
    Identifier,
    IntegerConstant,
    Plus,
    Minus,
    Star,
    Slash,
    LeftParen,
    RightParen,
}

impl LexemeSet for Expressions {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Identifier" => Some(Expressions::Identifier),
            "IntegerConstant" => Some(Expressions::IntegerConstant),
            "Plus" => Some(Expressions::Plus),
            "Minus" => Some(Expressions::Minus),
            "Star" => Some(Expressions::Star),
            "Slash" => Some(Expressions::Slash),
            "LeftParen" => Some(Expressions::LeftParen),
            "RightParen" => Some(Expressions::RightParen),
            _ => None,
        }
    }

    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Expressions::Identifier),
            1 => Some(Expressions::IntegerConstant),
            2 => Some(Expressions::Plus),
            3 => Some(Expressions::Minus),
            4 => Some(Expressions::Star),
            5 => Some(Expressions::Slash),
            6 => Some(Expressions::LeftParen),
            7 => Some(Expressions::RightParen),
            _ => None,
        }
    }

    fn to_name(self) -> &'static str {
        match self {
            Expressions::Identifier => "Identifier",
            Expressions::IntegerConstant => "IntegerConstant",
            Expressions::Plus => "Plus",
            Expressions::Minus => "Minus",
            Expressions::Star => "Star",
            Expressions::Slash => "Slash",
            Expressions::LeftParen => "LeftParen",
            Expressions::RightParen => "RightParen",
        }
    }

    fn to_id(self) -> u32 {
        self as u32
    }

    fn size() -> u32 {
        8
    }
}
