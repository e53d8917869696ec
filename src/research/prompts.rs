// SPDX-License-Identifier: MIT

//! Instructions sent to the text generator by each research node

pub const PROFILE_SUMMARY: &str = r#"You brief a sales team on a person they are about to contact.

Write a markdown summary of roughly 300 words from the profile below. Cover the
current role and what it involves, how the career has progressed, core skills,
education, and any notable achievements. Call out signs of purchasing authority
and the industries the person knows. Stay factual and neutral."#;

pub const SITE_ANALYSIS: &str = r#"The content below was scraped from a company website.

1. Summarize it in about 300 words, focusing on the mission, products and services.
2. Extract the company's main blog URL and its YouTube, Twitter (X) and Facebook
   profile URLs. Use an empty string for anything you cannot find. Turn relative
   links into absolute URLs using the page address given at the top."#;

pub const BLOG_ANALYSIS: &str = r#"Review the blog content below for the named company.

Assess how often it publishes, the topics and their relevance, writing quality,
SEO signals, and what could be improved. Finish with a score out of 10."#;

pub const NEWS_SUMMARY: &str = r#"Summarize the recent news below about the named company.

Focus on major announcements, product launches, growth signals, challenges and
relevant industry trends. Highlight whatever would help open a sales conversation."#;

pub const DIGITAL_PRESENCE: &str = r#"You evaluate a company's online presence for a marketing agency.

Using the sections below (website, blog, social media, news), write a markdown
report with: a two or three sentence executive summary; one section per channel
scored 1-10 on activity, quality and relevance; the main opportunities; and an
overall digital presence score from 1 to 10. Treat "Not available" sections as
missing data, not as evidence of absence."#;

pub const CONSOLIDATED_REPORT: &str = r#"Combine the research below into one report about this lead.

Sections: Executive Summary, Lead Profile, Company Overview, Digital Presence,
Key Opportunities, Recommended Approach. Use markdown."#;

pub const SCORING: &str = r#"You qualify leads for an agency selling AI-assisted marketing services.

Score the lead from 1 to 10 on each criterion:
- digital_presence_score: quality of website, blog and social activity
- industry_fit_score: how much the industry stands to gain from AI marketing
- company_scale_score: size and growth (20 to 200 employees is the sweet spot)
- pain_point_score: visible marketing gaps or automation opportunities
- decision_maker_score: seniority and influence over marketing spend

Reply with a single JSON object and nothing else:
{"digital_presence_score": 7, "industry_fit_score": 8, "company_scale_score": 6,
 "pain_point_score": 7, "decision_maker_score": 8, "overall_score": 7.2,
 "qualification_status": "qualified", "reasoning": "one or two sentences"}

qualification_status is "highly_qualified" from 8, "qualified" from 6,
"needs_review" from 4, otherwise "not_qualified"."#;

pub const OUTREACH_REPORT: &str = r#"Write a personalized outreach report for this prospect.

Our agency offers SEO blog content, automated social media management, AI content
personalization and digital presence optimization. Structure the report as:
introduction and reason for reaching out; analysis of the business and its current
digital presence with the gaps you see; three concrete solutions and how each
addresses a gap; expected results with indicative metrics; a clear next step.
Keep it specific to this business. Use markdown."#;

pub const EMAIL_DRAFT: &str = r#"Write a short cold email to this prospect.

Subject under 50 characters. Open with a personal hook, state the value for them
in two or three sentences, add one line of social proof and end with a low-effort
call to action. Under 150 words, grounded in details from the research, no stock
pleasantries.

Reply with JSON only: {"subject": "...", "email": "..."}"#;

pub const INTERVIEW_SCRIPT: &str = r#"Prepare a discovery call script for this prospect using SPIN selling.

Include a short personalized opening, two or three questions each for Situation,
Problem, Implication and Need-Payoff tailored to their business, talking points
between sections, and a closing that summarizes value and proposes next steps.
Use markdown."#;
