//! Predictive recursive-descent parser.
//!
//! Every decision is made on the next token alone and nothing is ever
//! re-parsed, so parse time is linear in the number of tokens.

use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::{Lexer, Token, TokenType};

pub struct Parser;

impl Parser {
    pub fn parse(input: &str) -> Result<Query> {
        let tokens = Lexer::new(input).tokenize()?;
        TokenParser::new(tokens).parse_query()
    }
}

struct TokenParser {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn parse_query(&mut self) -> Result<Query> {
        let mut query = Query::default();

        if self.match_token(&TokenType::Match) {
            query.match_clause = Some(MatchClause {
                patterns: self.parse_pattern_list()?,
            });
        }
        if self.match_token(&TokenType::Where) {
            query.where_clause = Some(self.parse_expression()?);
        }
        if self.match_token(&TokenType::Create) {
            query.create_clause = Some(CreateClause {
                patterns: self.parse_pattern_list()?,
            });
        }
        if self.match_token(&TokenType::Set) {
            query.set_clause = Some(self.parse_set()?);
        }
        if self.check(&TokenType::Detach) || self.check(&TokenType::Delete) {
            query.delete_clause = Some(self.parse_delete()?);
        }
        if self.match_token(&TokenType::Return) {
            query.return_clause = Some(self.parse_return()?);
        }
        if self.match_token(&TokenType::Order) {
            self.consume(&TokenType::By, "BY after ORDER")?;
            query.order_by = Some(self.parse_order_by()?);
        }
        if self.match_token(&TokenType::Skip) {
            query.skip = Some(self.parse_count("SKIP")?);
        }
        if self.match_token(&TokenType::Limit) {
            query.limit = Some(self.parse_count("LIMIT")?);
        }

        // Optional trailing semicolon.
        self.match_token(&TokenType::Semicolon);

        if !self.is_at_end() {
            let token = self.peek().clone();
            let message = match token.token_type {
                TokenType::Match
                | TokenType::Where
                | TokenType::Create
                | TokenType::Set
                | TokenType::Delete
                | TokenType::Detach
                | TokenType::Return
                | TokenType::Order
                | TokenType::Skip
                | TokenType::Limit => format!(
                    "unexpected {}: clauses must appear once, in the order MATCH, WHERE, CREATE, SET, DELETE, RETURN, ORDER BY, SKIP, LIMIT",
                    token.token_type
                ),
                _ => format!("unexpected {}", token.token_type),
            };
            return Err(self.error_at(&token, message));
        }

        if query == Query::default() {
            let token = self.peek().clone();
            return Err(self.error_at(&token, "expected a clause such as MATCH, CREATE or RETURN"));
        }
        if (query.order_by.is_some() || query.skip.is_some() || query.limit.is_some())
            && query.return_clause.is_none()
        {
            let token = self.peek().clone();
            return Err(self.error_at(&token, "ORDER BY, SKIP and LIMIT require a RETURN clause"));
        }

        Ok(query)
    }

    fn parse_pattern_list(&mut self) -> Result<Vec<Pattern>> {
        let mut patterns = vec![self.parse_pattern()?];
        while self.match_token(&TokenType::Comma) {
            patterns.push(self.parse_pattern()?);
        }
        Ok(patterns)
    }

    fn parse_count(&mut self, context: &str) -> Result<u64> {
        let token = self.advance().clone();
        match token.token_type.clone() {
            TokenType::Integer(n) if n >= 0 => Ok(n as u64),
            _ => Err(self.error_at(
                &token,
                format!("{context} expects a non-negative integer, found {}", token.token_type),
            )),
        }
    }

    fn parse_return(&mut self) -> Result<ReturnClause> {
        let distinct = self.match_token(&TokenType::Distinct);
        let mut items = Vec::new();
        loop {
            items.push(self.parse_return_item()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(ReturnClause { distinct, items })
    }

    fn parse_return_item(&mut self) -> Result<ReturnItem> {
        let expression = self.parse_expression()?;
        let alias = if self.match_token(&TokenType::As) {
            Some(self.parse_identifier("alias after AS")?)
        } else {
            None
        };
        Ok(ReturnItem { expression, alias })
    }

    fn parse_order_by(&mut self) -> Result<OrderByClause> {
        let mut items = Vec::new();
        loop {
            let expression = self.parse_expression()?;
            let direction = if self.match_token(&TokenType::Desc) {
                Direction::Descending
            } else {
                self.match_token(&TokenType::Asc); // Optional ASC
                Direction::Ascending
            };
            items.push(OrderByItem {
                expression,
                direction,
            });
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(OrderByClause { items })
    }

    fn parse_set(&mut self) -> Result<SetClause> {
        let mut items = Vec::new();
        loop {
            let variable = self.parse_identifier("variable in SET")?;
            if self.check(&TokenType::Colon) {
                let mut labels = Vec::new();
                while self.match_token(&TokenType::Colon) {
                    labels.push(self.parse_name("label")?);
                }
                items.push(SetItem::Labels { variable, labels });
            } else {
                self.consume(&TokenType::Dot, "'.' or ':' after variable in SET")?;
                let property = self.parse_name("property name in SET")?;
                self.consume(&TokenType::Equals, "'=' in SET")?;
                let value = self.parse_expression()?;
                items.push(SetItem::Property {
                    variable,
                    property,
                    value,
                });
            }
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(SetClause { items })
    }

    fn parse_delete(&mut self) -> Result<DeleteClause> {
        let detach = self.match_token(&TokenType::Detach);
        self.consume(&TokenType::Delete, "DELETE")?;
        let mut variables = Vec::new();
        loop {
            variables.push(self.parse_identifier("variable in DELETE")?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(DeleteClause { detach, variables })
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let mut elements = vec![PathElement::Node(self.parse_node()?)];
        while self.check(&TokenType::Dash) || self.check(&TokenType::LeftArrow) {
            elements.push(PathElement::Relationship(self.parse_relationship()?));
            elements.push(PathElement::Node(self.parse_node()?));
        }
        Ok(Pattern { elements })
    }

    fn parse_node(&mut self) -> Result<NodePattern> {
        self.consume(&TokenType::LeftParen, "'(' to start a node pattern")?;

        let variable = self.parse_optional_identifier();

        let mut labels = Vec::new();
        while self.match_token(&TokenType::Colon) {
            labels.push(self.parse_name("label")?);
        }

        let properties = if self.check(&TokenType::LeftBrace) {
            Some(self.parse_property_map()?)
        } else {
            None
        };

        self.consume(&TokenType::RightParen, "')' to close the node pattern")?;

        Ok(NodePattern {
            variable,
            labels,
            properties,
        })
    }

    fn parse_relationship(&mut self) -> Result<RelationshipPattern> {
        let start = self.peek().clone();
        let starts_left = self.match_token(&TokenType::LeftArrow);
        if !starts_left {
            self.consume(&TokenType::Dash, "'-' or '<-'")?;
        }

        let mut variable = None;
        let mut types = Vec::new();
        let mut properties = None;
        let mut variable_length = None;

        if self.match_token(&TokenType::LeftBracket) {
            variable = self.parse_optional_identifier();

            if self.match_token(&TokenType::Colon) {
                types.push(self.parse_name("relationship type")?);
                while self.match_token(&TokenType::Pipe) {
                    self.match_token(&TokenType::Colon);
                    types.push(self.parse_name("relationship type")?);
                }
            }

            if self.match_token(&TokenType::Asterisk) {
                variable_length = Some(self.parse_variable_length()?);
            }

            if self.check(&TokenType::LeftBrace) {
                properties = Some(self.parse_property_map()?);
            }

            self.consume(&TokenType::RightBracket, "']' to close the relationship")?;
        }

        let direction = if self.match_token(&TokenType::RightArrow) {
            if starts_left {
                return Err(self.error_at(&start, "relationship cannot point both ways (<-->)"));
            }
            RelationshipDirection::LeftToRight
        } else {
            self.consume(&TokenType::Dash, "'-' or '->' to close the relationship")?;
            if starts_left {
                RelationshipDirection::RightToLeft
            } else {
                RelationshipDirection::Undirected
            }
        };

        Ok(RelationshipPattern {
            variable,
            types,
            direction,
            properties,
            variable_length,
        })
    }

    fn parse_variable_length(&mut self) -> Result<VariableLength> {
        let start = self.peek().clone();
        let (min, max) = if self.check_integer() {
            let n = self.parse_hop_count()?;
            if self.match_token(&TokenType::RangeDots) {
                let max = if self.check_integer() {
                    Some(self.parse_hop_count()?)
                } else {
                    None
                };
                (Some(n), max)
            } else {
                (Some(n), Some(n))
            }
        } else if self.match_token(&TokenType::RangeDots) {
            (None, Some(self.parse_hop_count()?))
        } else {
            (None, None)
        };

        if let (Some(min), Some(max)) = (min, max)
            && min > max
        {
            return Err(self.error_at(
                &start,
                format!("invalid hop range *{min}..{max}: minimum exceeds maximum"),
            ));
        }
        Ok(VariableLength { min, max })
    }

    fn parse_hop_count(&mut self) -> Result<u32> {
        let token = self.advance().clone();
        match token.token_type.clone() {
            TokenType::Integer(n) if (0..=i64::from(u32::MAX)).contains(&n) => Ok(n as u32),
            _ => Err(self.error_at(
                &token,
                format!("expected hop count, found {}", token.token_type),
            )),
        }
    }

    fn parse_property_map(&mut self) -> Result<PropertyMap> {
        self.consume(&TokenType::LeftBrace, "'{'")?;
        let mut properties = Vec::new();

        while !self.check(&TokenType::RightBrace) {
            let key = self.parse_name("property key")?;
            self.consume(&TokenType::Colon, "':' after property key")?;
            let value = self.parse_expression()?;
            properties.push(PropertyPair { key, value });

            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        self.consume(&TokenType::RightBrace, "'}' to close the property map")?;
        Ok(PropertyMap { properties })
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression> {
        let mut expr = self.parse_xor()?;
        while self.match_token(&TokenType::Or) {
            let right = self.parse_xor()?;
            expr = binary(expr, BinaryOperator::Or, right);
        }
        Ok(expr)
    }

    fn parse_xor(&mut self) -> Result<Expression> {
        let mut expr = self.parse_and()?;
        while self.match_token(&TokenType::Xor) {
            let right = self.parse_and()?;
            expr = binary(expr, BinaryOperator::Xor, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expression> {
        let mut expr = self.parse_not()?;
        while self.match_token(&TokenType::And) {
            let right = self.parse_not()?;
            expr = binary(expr, BinaryOperator::And, right);
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> Result<Expression> {
        if self.match_token(&TokenType::Not) {
            let operand = self.parse_not()?;
            return Ok(unary(UnaryOperator::Not, operand));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression> {
        let mut expr = self.parse_additive()?;
        loop {
            let operator = match self.peek().token_type {
                TokenType::Equals => BinaryOperator::Equal,
                TokenType::NotEquals => BinaryOperator::NotEqual,
                TokenType::LessThan => BinaryOperator::LessThan,
                TokenType::LessEqual => BinaryOperator::LessEqual,
                TokenType::GreaterThan => BinaryOperator::GreaterThan,
                TokenType::GreaterEqual => BinaryOperator::GreaterEqual,
                TokenType::RegexMatch => BinaryOperator::RegexMatch,
                TokenType::Contains => BinaryOperator::Contains,
                TokenType::In => BinaryOperator::In,
                TokenType::Starts => {
                    self.advance();
                    self.consume(&TokenType::With, "WITH after STARTS")?;
                    let right = self.parse_additive()?;
                    expr = binary(expr, BinaryOperator::StartsWith, right);
                    continue;
                }
                TokenType::Ends => {
                    self.advance();
                    self.consume(&TokenType::With, "WITH after ENDS")?;
                    let right = self.parse_additive()?;
                    expr = binary(expr, BinaryOperator::EndsWith, right);
                    continue;
                }
                TokenType::Is => {
                    self.advance();
                    let negated = self.match_token(&TokenType::Not);
                    self.consume(&TokenType::Null, "NULL after IS")?;
                    let operator = if negated {
                        UnaryOperator::IsNotNull
                    } else {
                        UnaryOperator::IsNull
                    };
                    expr = unary(operator, expr);
                    continue;
                }
                // `a<-1` lexes as an arrow; inside an expression it is `a < -1`.
                TokenType::LeftArrow => {
                    self.advance();
                    let operand = self.parse_additive()?;
                    expr = binary(expr, BinaryOperator::LessThan, unary(UnaryOperator::Negate, operand));
                    continue;
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            expr = binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expression> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let operator = if self.match_token(&TokenType::Plus) {
                BinaryOperator::Add
            } else if self.match_token(&TokenType::Dash) {
                BinaryOperator::Subtract
            } else {
                break;
            };
            let right = self.parse_multiplicative()?;
            expr = binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression> {
        let mut expr = self.parse_unary()?;
        loop {
            let operator = if self.match_token(&TokenType::Asterisk) {
                BinaryOperator::Multiply
            } else if self.match_token(&TokenType::Divide) {
                BinaryOperator::Divide
            } else if self.match_token(&TokenType::Modulo) {
                BinaryOperator::Modulo
            } else {
                break;
            };
            let right = self.parse_unary()?;
            expr = binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        if self.match_token(&TokenType::Dash) {
            let operand = self.parse_unary()?;
            return Ok(unary(UnaryOperator::Negate, operand));
        }
        if self.match_token(&TokenType::Plus) {
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let token = self.advance().clone();
        match token.token_type.clone() {
            TokenType::String(s) => Ok(Expression::Literal(Literal::String(s))),
            TokenType::Integer(i) => Ok(Expression::Literal(Literal::Integer(i))),
            TokenType::Float(f) => Ok(Expression::Literal(Literal::Float(f))),
            TokenType::Boolean(b) => Ok(Expression::Literal(Literal::Boolean(b))),
            TokenType::Null => Ok(Expression::Literal(Literal::Null)),
            TokenType::Parameter(name) => Ok(Expression::Parameter(name)),
            TokenType::Identifier(name) => {
                if self.match_token(&TokenType::LeftParen) {
                    self.parse_function_call(name, &token)
                } else if self.match_token(&TokenType::Dot) {
                    let property = self.parse_name("property name after '.'")?;
                    Ok(Expression::PropertyAccess(PropertyAccess {
                        variable: name,
                        property,
                    }))
                } else {
                    Ok(Expression::Variable(name))
                }
            }
            TokenType::LeftParen => {
                let expr = self.parse_expression()?;
                self.consume(&TokenType::RightParen, "')' to close the expression")?;
                Ok(expr)
            }
            TokenType::LeftBracket => {
                let mut items = Vec::new();
                if !self.check(&TokenType::RightBracket) {
                    loop {
                        items.push(self.parse_expression()?);
                        if !self.match_token(&TokenType::Comma) {
                            break;
                        }
                    }
                }
                self.consume(&TokenType::RightBracket, "']' to close the list")?;
                Ok(Expression::List(items))
            }
            other => Err(self.error_at(&token, format!("expected an expression, found {other}"))),
        }
    }

    fn parse_function_call(&mut self, name: String, name_token: &Token) -> Result<Expression> {
        let mut call = FunctionCall {
            name,
            args: Vec::new(),
            distinct: false,
            star: false,
        };
        if self.match_token(&TokenType::Asterisk) {
            if !call.name.eq_ignore_ascii_case("COUNT") {
                return Err(self.error_at(
                    name_token,
                    format!("only COUNT accepts '*', not {}", call.name),
                ));
            }
            call.star = true;
        } else {
            call.distinct = self.match_token(&TokenType::Distinct);
            if !self.check(&TokenType::RightParen) {
                loop {
                    call.args.push(self.parse_expression()?);
                    if !self.match_token(&TokenType::Comma) {
                        break;
                    }
                }
            }
        }
        self.consume(&TokenType::RightParen, "')' after function arguments")?;
        Ok(Expression::FunctionCall(call))
    }

    fn parse_identifier(&mut self, what: &str) -> Result<String> {
        let token = self.peek().clone();
        match &token.token_type {
            TokenType::Identifier(name) => {
                self.advance();
                Ok(name.clone())
            }
            other => Err(self.error_at(&token, format!("expected {what}, found {other}"))),
        }
    }

    /// Labels, relationship types and property keys may also be keywords,
    /// spelled as written.
    fn parse_name(&mut self, what: &str) -> Result<String> {
        if let Some(word) = self.peek().word.clone() {
            self.advance();
            return Ok(word);
        }
        self.parse_identifier(what)
    }

    fn parse_optional_identifier(&mut self) -> Option<String> {
        if let TokenType::Identifier(name) = &self.peek().token_type {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            None
        }
    }

    // Helpers
    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1; // EOF
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) -> &Token {
        let current = self.position.min(self.tokens.len() - 1);
        if !self.is_at_end() {
            self.position += 1;
        }
        &self.tokens[current]
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn check(&self, type_: &TokenType) -> bool {
        std::mem::discriminant(&self.peek().token_type) == std::mem::discriminant(type_)
    }

    fn check_integer(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Integer(_))
    }

    fn match_token(&mut self, type_: &TokenType) -> bool {
        if self.check(type_) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, type_: &TokenType, expected: &str) -> Result<()> {
        if self.check(type_) {
            self.advance();
            Ok(())
        } else {
            let token = self.peek().clone();
            Err(self.error_at(
                &token,
                format!("expected {expected}, found {}", token.token_type),
            ))
        }
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> Error {
        Error::Syntax {
            message: message.into(),
            position: token.position,
            line: token.line,
            column: token.column,
        }
    }
}

fn binary(left: Expression, operator: BinaryOperator, right: Expression) -> Expression {
    Expression::Binary(Box::new(BinaryExpression {
        left,
        operator,
        right,
    }))
}

fn unary(operator: UnaryOperator, operand: Expression) -> Expression {
    Expression::Unary(Box::new(UnaryExpression { operator, operand }))
}
